use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mailtrack::dispatch::{
    DispatchError, Dispatcher, EmailDispatchRequest, SubmissionPayload, Submitter,
};

const BASE: &str = "https://tracker.example";

/// Downstream stand-in that counts calls and records what it was sent.
#[derive(Default)]
struct StubSubmitter {
    calls: AtomicUsize,
    seen: Mutex<Option<(SubmissionPayload, String)>>,
    fail: Option<(u16, String)>,
}

#[async_trait]
impl Submitter for StubSubmitter {
    async fn submit(
        &self,
        payload: &SubmissionPayload,
        bearer: &str,
    ) -> Result<String, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen.lock().unwrap() = Some((payload.clone(), bearer.to_string()));

        match &self.fail {
            Some((status, message)) => Err(DispatchError::Downstream {
                status: *status,
                message: message.clone(),
            }),
            None => Ok("msg-1".to_string()),
        }
    }
}

fn dispatcher(stub: &Arc<StubSubmitter>) -> Dispatcher<Arc<StubSubmitter>> {
    Dispatcher::new(stub.clone(), BASE.to_string())
}

fn request(html: &str) -> EmailDispatchRequest {
    EmailDispatchRequest {
        to: vec!["user@example.com".to_string()],
        subject: "Hello".to_string(),
        html: html.to_string(),
        attachments: vec![],
        tracking_id: None,
    }
}

#[tokio::test]
async fn empty_recipients_fails_without_network_call() {
    let stub = Arc::new(StubSubmitter::default());
    let mut req = request("<p>Hi</p>");
    req.to = vec![];

    let result = dispatcher(&stub).dispatch(req, "token").await;

    assert!(matches!(result, Err(DispatchError::Validation(_))));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn validation_order_reports_recipients_first() {
    let stub = Arc::new(StubSubmitter::default());
    let req = EmailDispatchRequest {
        to: vec![],
        subject: String::new(),
        html: String::new(),
        attachments: vec![],
        tracking_id: None,
    };

    let err = dispatcher(&stub).dispatch(req, "token").await.unwrap_err();
    assert!(err.to_string().contains("recipients"));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_subject_and_body_fail_fast() {
    let stub = Arc::new(StubSubmitter::default());

    let mut req = request("<p>Hi</p>");
    req.subject = String::new();
    let err = dispatcher(&stub).dispatch(req, "t").await.unwrap_err();
    assert!(err.to_string().contains("subject"));

    let mut req = request("");
    req.subject = "Hi".to_string();
    let err = dispatcher(&stub).dispatch(req, "t").await.unwrap_err();
    assert!(err.to_string().contains("body"));

    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn caller_supplied_tracking_id_is_trusted() {
    let stub = Arc::new(StubSubmitter::default());
    let mut req = request(r#"<a href="https://example.com">c</a>"#);
    req.tracking_id = Some("abc123".to_string());

    let receipt = dispatcher(&stub).dispatch(req, "token").await.unwrap();
    assert_eq!(receipt.tracking_id, "abc123");
    assert_eq!(receipt.message_id, "msg-1");

    let (payload, bearer) = stub.seen.lock().unwrap().clone().unwrap();
    assert_eq!(bearer, "token");
    assert!(payload.html.contains("/api/track/open/abc123"));
    assert!(payload
        .html
        .contains("/api/track/click/abc123?url=https%3A%2F%2Fexample.com"));
}

#[tokio::test]
async fn missing_or_empty_tracking_id_generates_uuid() {
    let stub = Arc::new(StubSubmitter::default());

    let receipt = dispatcher(&stub)
        .dispatch(request("<p>Hi</p>"), "token")
        .await
        .unwrap();
    assert!(uuid::Uuid::parse_str(&receipt.tracking_id).is_ok());

    let mut req = request("<p>Hi</p>");
    req.tracking_id = Some(String::new());
    let receipt = dispatcher(&stub).dispatch(req, "token").await.unwrap();
    assert!(uuid::Uuid::parse_str(&receipt.tracking_id).is_ok());
}

#[tokio::test]
async fn distinct_dispatches_get_distinct_tracking_ids() {
    let stub = Arc::new(StubSubmitter::default());
    let d = dispatcher(&stub);

    let a = d.dispatch(request("<p>a</p>"), "t").await.unwrap();
    let b = d.dispatch(request("<p>b</p>"), "t").await.unwrap();
    assert_ne!(a.tracking_id, b.tracking_id);
}

#[tokio::test]
async fn downstream_failure_passes_through_unchanged() {
    let stub = Arc::new(StubSubmitter {
        fail: Some((503, "mail service unavailable".to_string())),
        ..Default::default()
    });

    let err = dispatcher(&stub)
        .dispatch(request("<p>Hi</p>"), "token")
        .await
        .unwrap_err();

    match err {
        DispatchError::Downstream { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "mail service unavailable");
        }
        other => panic!("expected downstream error, got {other:?}"),
    }
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn subject_and_recipients_are_forwarded_verbatim() {
    let stub = Arc::new(StubSubmitter::default());
    let mut req = request("<p>Hi</p>");
    req.to = vec!["a@x.com".to_string(), "b@x.com".to_string()];
    req.subject = "Quarterly report".to_string();

    dispatcher(&stub).dispatch(req, "token").await.unwrap();

    let (payload, _) = stub.seen.lock().unwrap().clone().unwrap();
    assert_eq!(payload.to, vec!["a@x.com", "b@x.com"]);
    assert_eq!(payload.subject, "Quarterly report");
}
