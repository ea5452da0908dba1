//! Raw `AF_NETLINK` socket driven by the tokio reactor.

use std::future::Future;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use log::debug;
use tokio::io::unix::AsyncFd;

use super::channel::Transport;

pub struct NetlinkSocket {
    fd: AsyncFd<OwnedFd>,
    port_id: u32,
}

impl NetlinkSocket {
    /// Opens a non-blocking netlink socket for protocol `family` and binds it
    /// to a kernel-assigned port id. Must be called within a tokio runtime.
    pub fn connect(family: i32) -> io::Result<Self> {
        let raw = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                family,
            )
        };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let mut addr = kernel_address();
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut len = mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockname(
                fd.as_raw_fd(),
                &mut addr as *mut libc::sockaddr_nl as *mut libc::sockaddr,
                &mut len,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        debug!("netlink family {} bound to port id {}", family, addr.nl_pid);

        Ok(Self {
            fd: AsyncFd::new(fd)?,
            port_id: addr.nl_pid,
        })
    }

    async fn send_datagram(&self, datagram: &[u8]) -> io::Result<()> {
        let dest = kernel_address();
        loop {
            let mut guard = self.fd.writable().await?;
            let sent = guard.try_io(|inner| {
                let rc = unsafe {
                    libc::sendto(
                        inner.get_ref().as_raw_fd(),
                        datagram.as_ptr() as *const libc::c_void,
                        datagram.len(),
                        0,
                        &dest as *const libc::sockaddr_nl as *const libc::sockaddr,
                        mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
                    )
                };
                if rc < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(())
                }
            });
            match sent {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    async fn recv_datagram(&self) -> io::Result<Vec<u8>> {
        loop {
            let mut guard = self.fd.readable().await?;
            let received = guard.try_io(|inner| {
                let fd = inner.get_ref().as_raw_fd();
                // Peek the full datagram size first so nothing is truncated.
                let size = unsafe {
                    libc::recv(fd, std::ptr::null_mut(), 0, libc::MSG_PEEK | libc::MSG_TRUNC)
                };
                if size < 0 {
                    return Err(io::Error::last_os_error());
                }
                let mut buf = vec![0u8; size as usize];
                let n = unsafe {
                    libc::recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0)
                };
                if n < 0 {
                    return Err(io::Error::last_os_error());
                }
                buf.truncate(n as usize);
                Ok(buf)
            });
            match received {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }
}

impl Transport for NetlinkSocket {
    fn port_id(&self) -> u32 {
        self.port_id
    }

    fn send(&self, datagram: &[u8]) -> impl Future<Output = io::Result<()>> + Send {
        self.send_datagram(datagram)
    }

    fn recv(&self) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
        self.recv_datagram()
    }
}

fn kernel_address() -> libc::sockaddr_nl {
    let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
    addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
    addr
}
