//! Webhook notification adapters.
//!
//! ```text
//!  DispatchSession ──submit──▶ QueuedNotifier ──▶ NotifyOutbox
//!                                                     │
//!                               run_notifier_worker ◀─┘
//!                                     │ HttpNotifier::post
//!                                     ▼
//!                     EventQueue ◀── NotificationCompleted
//! ```
//!
//! [`InlineNotifier`] performs the same hand-off synchronously; the host
//! simulation and the integration tests use it.

use log::{debug, error, info, warn};

use crate::app::ports::{NotificationTransport, Notifier};
use crate::dispatch::notification::NotificationRequest;
use crate::error::NotificationError;
use crate::events::{EventQueue, NotifyJob, NotifyOutbox, SessionEvent};

#[cfg(target_os = "espidf")]
use crate::dispatch::notification::CONTENT_TYPE;

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    http::{
        Method,
        client::{Configuration as HttpConfiguration, EspHttpConnection},
    },
    sys::EspError,
};

// ───────────────────────────────────────────────────────────────
// Queued (threaded) notifier
// ───────────────────────────────────────────────────────────────

/// Hands jobs to the notifier worker without blocking.
pub struct QueuedNotifier<'a> {
    outbox: &'a NotifyOutbox,
}

impl<'a> QueuedNotifier<'a> {
    pub fn new(outbox: &'a NotifyOutbox) -> Self {
        Self { outbox }
    }
}

impl Notifier for QueuedNotifier<'_> {
    fn submit(&mut self, cycle: u32, request: NotificationRequest) -> Result<(), NotificationError> {
        self.outbox
            .try_send(NotifyJob { cycle, request })
            .map_err(|_| {
                warn!("Notify outbox full, cycle {} rejected", cycle);
                NotificationError::Busy
            })
    }
}

/// Deliver one job and post its completion.
pub fn deliver(job: NotifyJob, transport: &mut impl NotificationTransport, queue: &EventQueue) {
    debug!("Delivering cycle {} to {}", job.cycle, job.request.endpoint);
    let result = transport.post(&job.request);
    let completion = SessionEvent::NotificationCompleted {
        cycle: job.cycle,
        result,
    };
    if let Some(evicted) = queue.push(completion) {
        error!(
            "Completion of cycle {} displaced {:?} from a full event queue",
            job.cycle, evicted
        );
    }
}

/// Notifier thread body: block on the outbox forever.
pub fn run_notifier_worker(
    outbox: &NotifyOutbox,
    transport: &mut impl NotificationTransport,
    queue: &EventQueue,
) -> ! {
    info!("Notifier worker running");
    loop {
        let job = futures_lite::future::block_on(outbox.receive());
        deliver(job, transport, queue);
    }
}

// ───────────────────────────────────────────────────────────────
// Inline notifier
// ───────────────────────────────────────────────────────────────

/// Posts synchronously inside `submit`, then queues the completion.
pub struct InlineNotifier<'q, T> {
    transport: T,
    queue: &'q EventQueue,
}

impl<'q, T: NotificationTransport> InlineNotifier<'q, T> {
    pub fn new(transport: T, queue: &'q EventQueue) -> Self {
        Self { transport, queue }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: NotificationTransport> Notifier for InlineNotifier<'_, T> {
    fn submit(&mut self, cycle: u32, request: NotificationRequest) -> Result<(), NotificationError> {
        deliver(NotifyJob { cycle, request }, &mut self.transport, self.queue);
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// HTTP transport
// ───────────────────────────────────────────────────────────────

/// Form-encoded `POST` to the gateway webhook.  2xx is success.
pub struct HttpNotifier {
    timeout_ms: u32,
}

impl HttpNotifier {
    pub fn new(timeout_ms: u32) -> Self {
        Self { timeout_ms }
    }
}

#[cfg(target_os = "espidf")]
impl NotificationTransport for HttpNotifier {
    fn post(&mut self, request: &NotificationRequest) -> Result<u16, NotificationError> {
        let config = HttpConfiguration {
            timeout: Some(core::time::Duration::from_millis(u64::from(self.timeout_ms))),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let fail = |e: EspError| {
            warn!("POST {} failed: {}", request.endpoint, e);
            if e.code() == esp_idf_svc::sys::ESP_ERR_HTTP_EAGAIN as i32 {
                NotificationError::Timeout
            } else {
                NotificationError::TransportFailure
            }
        };

        let body = request.body.as_bytes();
        let length = body.len().to_string();
        let headers = [
            ("Content-Type", CONTENT_TYPE),
            ("Content-Length", length.as_str()),
        ];

        let mut conn = EspHttpConnection::new(&config).map_err(fail)?;
        conn.initiate_request(Method::Post, &request.endpoint, &headers)
            .map_err(fail)?;
        let mut sent = 0;
        while sent < body.len() {
            let n = conn.write(&body[sent..]).map_err(fail)?;
            if n == 0 {
                return Err(NotificationError::TransportFailure);
            }
            sent += n;
        }
        conn.initiate_response().map_err(fail)?;

        let status = conn.status();
        if (200..300).contains(&status) {
            Ok(status)
        } else {
            Err(NotificationError::NonSuccessStatus(status))
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl NotificationTransport for HttpNotifier {
    fn post(&mut self, request: &NotificationRequest) -> Result<u16, NotificationError> {
        info!(
            "HTTP(sim): POST {} body='{}' (timeout {} ms)",
            request.endpoint, request.body, self.timeout_ms
        );
        Ok(200)
    }
}
