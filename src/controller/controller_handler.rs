use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use uuid::Uuid;

use crate::capture::{CaptureCounters, CaptureLoop, OutputSink, StopReason, ThroughputReporter};
use crate::configuration::config::Args;
use crate::configuration::types::Config;
use crate::error_handling::types::*;
use crate::session::{Session, Transport};
use crate::shutdown::{DrainOutcome, ShutdownCoordinator};

/// What a finished capture session produced.
#[derive(Debug, Clone)]
pub struct CaptureSummary {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records written, trailing drain batch included.
    pub total_records: u64,
    pub stop_reason: StopReason,
    /// Records that arrived in the drain batch after shutdown began.
    pub trailing_records: usize,
}

pub struct Controller {
    pub config: Config,
    counters: Arc<CaptureCounters>,
}

impl Controller {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            counters: Arc::new(CaptureCounters::new()),
        }
    }

    /// Resolves the configuration from `args` (defaults, optional TOML file,
    /// then flags) and builds the controller.
    pub fn from_args(args: &Args) -> Result<Self, ControllerError> {
        let config = Config::from_args(args)?;
        Ok(Self::new(config))
    }

    pub fn counters(&self) -> Arc<CaptureCounters> {
        Arc::clone(&self.counters)
    }

    /// Connects to the kernel module, opens the output file and captures
    /// until SIGINT/SIGTERM or until the kernel ends the session.
    #[cfg(target_os = "linux")]
    pub async fn run(&self) -> Result<CaptureSummary, ControllerError> {
        use crate::shutdown::{termination_signal, ShutdownFlag};

        let session = Arc::new(Session::connect(self.config.family, ShutdownFlag::new())?);
        let mut sink = OutputSink::open(
            &self.config.output_path,
            self.config.buffer_size,
            self.config.display,
        )?;
        let trigger = termination_signal().map_err(|e| {
            ControllerError::InitializationFailed(format!("signal handlers: {}", e))
        })?;

        self.capture(session, &mut sink, trigger).await
    }

    #[cfg(not(target_os = "linux"))]
    pub async fn run(&self) -> Result<CaptureSummary, ControllerError> {
        Err(ControllerError::InitializationFailed(
            "netlink capture is only available on Linux".to_string(),
        ))
    }

    /// Drives one session: handshake, capture loop, then the drain handoff
    /// once `trigger` has fired. The sink is flushed before returning; a
    /// failed flush is reported, not returned.
    pub async fn capture<T, W, F>(
        &self,
        session: Arc<Session<T>>,
        sink: &mut OutputSink<W>,
        trigger: F,
    ) -> Result<CaptureSummary, ControllerError>
    where
        T: Transport,
        W: Write,
        F: Future<Output = ()> + Send + 'static,
    {
        let id = session.id();
        let started_at = Utc::now();

        if !session.handshake(self.config.handshake_timeout()).await {
            error!("[{}] kernel module did not answer the handshake", id);
            return Err(SessionError::HandshakeRejected.into());
        }

        let handoff =
            ShutdownCoordinator::new(Arc::clone(&session), self.config.grace_period()).spawn(trigger);

        let reporter = if self.config.display {
            None
        } else {
            let reporter =
                ThroughputReporter::new(Arc::clone(&self.counters), self.config.report_interval());
            Some(reporter.spawn(session.stopping().clone()))
        };

        let capture = CaptureLoop::new(Arc::clone(&session), Arc::clone(&self.counters));
        let stop_reason = capture.run(sink).await;

        let mut trailing_records = 0;
        match stop_reason {
            StopReason::Interrupted => match handoff.collect().await {
                DrainOutcome::Trailing(batch) => {
                    if let Err(e) = sink.write_text(&batch.text) {
                        error!("[{}] {}", id, e);
                    }
                    self.counters.record(batch.records as u64);
                    trailing_records = batch.records;
                }
                DrainOutcome::Marker => debug!("[{}] session drained", id),
                DrainOutcome::Nothing => debug!("[{}] no drain batch within grace period", id),
            },
            StopReason::DrainMarker => {
                info!("[{}] kernel ended the session", id);
                handoff.cancel();
            }
        }

        if let Some(reporter) = reporter {
            reporter.abort();
        }
        if let Err(e) = sink.flush() {
            error!("[{}] {}", id, e);
        }

        let summary = CaptureSummary {
            session_id: id,
            started_at,
            finished_at: Utc::now(),
            total_records: self.counters.total(),
            stop_reason,
            trailing_records,
        };
        info!(
            "[{}] captured {} records between {} and {} ({} after shutdown began)",
            id,
            summary.total_records,
            summary.started_at.format("%Y-%m-%d %H:%M:%S"),
            summary.finished_at.format("%Y-%m-%d %H:%M:%S"),
            summary.trailing_records
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FlowRecord, Protocol};
    use crate::session::loopback::{self, KernelPeer, LoopbackTransport};
    use crate::session::{HANDSHAKE_REQUEST, HANDSHAKE_RESPONSE, SHUTDOWN_TOKEN};
    use crate::shutdown::ShutdownFlag;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn flow(n: u8) -> FlowRecord {
        FlowRecord {
            source_address: Ipv4Addr::new(10, 0, 0, n),
            source_port: 1000 + n as u16,
            dest_address: Ipv4Addr::new(172, 16, 0, 1),
            dest_port: 80,
            protocol: if n % 2 == 0 { Protocol::Udp } else { Protocol::Tcp },
        }
    }

    fn setup() -> (Controller, Arc<Session<LoopbackTransport>>, KernelPeer) {
        let config = Config {
            display: true,
            grace_period_secs: 5,
            handshake_timeout_secs: 2,
            ..Config::default()
        };
        let (transport, kernel) = loopback::pair();
        (
            Controller::new(config),
            Arc::new(Session::new(transport, ShutdownFlag::new())),
            kernel,
        )
    }

    async fn accept_handshake(kernel: &mut KernelPeer) {
        let request = kernel.next_request().await.unwrap();
        assert_eq!(request.payload, HANDSHAKE_REQUEST);
        kernel.reply(&request, HANDSHAKE_RESPONSE);
    }

    async fn wait_for_total(counters: &CaptureCounters, total: u64) {
        while counters.total() < total {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn lines(sink: &OutputSink<Vec<u8>>) -> Vec<String> {
        String::from_utf8(sink.get_ref().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn signal_then_drain_marker_keeps_every_record() {
        let (controller, session, mut kernel) = setup();
        let counters = controller.counters();
        let (fire, fired) = oneshot::channel::<()>();
        let mut sink = OutputSink::new(Vec::new(), 4096, false);

        let kernel_side = async move {
            accept_handshake(&mut kernel).await;
            for n in 0..3 {
                kernel.push_records(&[flow(2 * n + 1), flow(2 * n + 2)]);
            }
            wait_for_total(&counters, 6).await;
            fire.send(()).unwrap();

            let request = kernel.next_request().await.unwrap();
            assert_eq!(request.payload, SHUTDOWN_TOKEN);
            kernel.push(SHUTDOWN_TOKEN);
            kernel
        };
        let capture = controller.capture(session, &mut sink, async move {
            let _ = fired.await;
        });

        let (summary, _kernel) = tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(capture, kernel_side)
        })
        .await
        .expect("capture finished");
        let summary = summary.unwrap();

        assert_eq!(summary.stop_reason, StopReason::Interrupted);
        assert_eq!(summary.total_records, 6);
        assert_eq!(summary.trailing_records, 0);
        let lines = lines(&sink);
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "10.0.0.1 1001 172.16.0.1 80 TCP");
        assert_eq!(lines[5], "10.0.0.6 1006 172.16.0.1 80 UDP");
    }

    #[tokio::test]
    async fn trailing_batch_is_written_and_counted_once() {
        let (controller, session, mut kernel) = setup();
        let counters = controller.counters();
        let (fire, fired) = oneshot::channel::<()>();
        let mut sink = OutputSink::new(Vec::new(), 4096, false);

        let kernel_side = async move {
            accept_handshake(&mut kernel).await;
            kernel.push_records(&[flow(1)]);
            wait_for_total(&counters, 1).await;
            fire.send(()).unwrap();

            let request = kernel.next_request().await.unwrap();
            assert_eq!(request.payload, SHUTDOWN_TOKEN);
            kernel.push_records(&[flow(2), flow(3)]);
            kernel
        };
        let capture = controller.capture(session, &mut sink, async move {
            let _ = fired.await;
        });

        let (summary, _kernel) = tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(capture, kernel_side)
        })
        .await
        .expect("capture finished");
        let summary = summary.unwrap();

        assert_eq!(summary.trailing_records, 2);
        assert_eq!(summary.total_records, 3);
        assert_eq!(
            lines(&sink),
            vec![
                "10.0.0.1 1001 172.16.0.1 80 TCP",
                "10.0.0.2 1002 172.16.0.1 80 UDP",
                "10.0.0.3 1003 172.16.0.1 80 TCP",
            ]
        );
    }

    #[tokio::test]
    async fn kernel_initiated_marker_ends_capture() {
        let (controller, session, mut kernel) = setup();
        let mut sink = OutputSink::new(Vec::new(), 4096, false);

        let kernel_side = async move {
            accept_handshake(&mut kernel).await;
            kernel.push_records(&[flow(1), flow(2)]);
            kernel.push(SHUTDOWN_TOKEN);
            kernel
        };
        let capture = controller.capture(session.clone(), &mut sink, std::future::pending());

        let (summary, _kernel) = tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(capture, kernel_side)
        })
        .await
        .expect("capture finished");
        let summary = summary.unwrap();

        assert_eq!(summary.stop_reason, StopReason::DrainMarker);
        assert_eq!(summary.total_records, 2);
        assert!(!session.stopping().is_stopping());
        assert_eq!(lines(&sink).len(), 2);
    }

    #[tokio::test]
    async fn rejected_handshake_is_fatal() {
        let (controller, session, mut kernel) = setup();
        let mut sink = OutputSink::new(Vec::new(), 4096, false);

        let kernel_side = async move {
            let request = kernel.next_request().await.unwrap();
            kernel.reply(&request, b"nopenope");
            kernel
        };
        let capture = controller.capture(session, &mut sink, std::future::pending());

        let (result, _kernel) = tokio::join!(capture, kernel_side);
        assert!(matches!(
            result,
            Err(ControllerError::SessionError(SessionError::HandshakeRejected))
        ));
        assert!(sink.get_ref().is_empty());
    }

    #[tokio::test]
    async fn malformed_datagram_does_not_stop_capture() {
        let (controller, session, mut kernel) = setup();
        let mut sink = OutputSink::new(Vec::new(), 4096, false);

        let kernel_side = async move {
            accept_handshake(&mut kernel).await;
            kernel.push_raw(vec![0xff; 5]);
            kernel.push_records(&[flow(4)]);
            kernel.push(SHUTDOWN_TOKEN);
            kernel
        };
        let capture = controller.capture(session, &mut sink, std::future::pending());

        let (summary, _kernel) = tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(capture, kernel_side)
        })
        .await
        .expect("capture finished");

        assert_eq!(summary.unwrap().total_records, 1);
        assert_eq!(lines(&sink), vec!["10.0.0.4 1004 172.16.0.1 80 UDP"]);
    }

    struct FlushFailingWriter {
        written: Vec<u8>,
    }

    impl Write for FlushFailingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }
    }

    #[tokio::test]
    async fn failed_final_flush_still_completes_capture() {
        let (controller, session, mut kernel) = setup();
        let mut sink = OutputSink::new(
            FlushFailingWriter {
                written: Vec::new(),
            },
            4096,
            false,
        );

        let kernel_side = async move {
            accept_handshake(&mut kernel).await;
            kernel.push_records(&[flow(1)]);
            kernel.push(SHUTDOWN_TOKEN);
            kernel
        };
        let capture = controller.capture(session, &mut sink, std::future::pending());

        let (summary, _kernel) = tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(capture, kernel_side)
        })
        .await
        .expect("capture finished");

        let summary = summary.unwrap();
        assert_eq!(summary.stop_reason, StopReason::DrainMarker);
        assert_eq!(summary.total_records, 1);
        assert_eq!(
            sink.get_ref().written.as_slice(),
            b"10.0.0.1 1001 172.16.0.1 80 TCP\n"
        );
    }

    #[test]
    fn invalid_arguments_surface_as_configuration_error() {
        let args = Args {
            log_level: Some("loud".to_string()),
            ..Args::default()
        };
        assert!(matches!(
            Controller::from_args(&args),
            Err(ControllerError::ConfigurationError(ConfigError::InvalidValue(_)))
        ));

        let controller = Controller::from_args(&Args {
            grace_period_secs: Some(3),
            ..Args::default()
        })
        .unwrap();
        assert_eq!(controller.config.grace_period_secs, 3);
        assert_eq!(controller.counters().total(), 0);
    }
}
