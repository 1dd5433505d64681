//! End-to-end flows through the pipeline: registration gating, per-event
//! filtering, deferred commits and sink failures.

use std::cell::RefCell;
use std::rc::Rc;

use audit_pipeline::{
    Actor, ActionLink, AuditPipeline, Dimension, Error, EventArg, EventConnector,
    ExclusionSettings, ExclusionSource, LogEntry, LogRequest, LogSink, RecordId, RecordOverride,
    RequestMeta, SinkError, SinkErrorKind, VecSink,
};

fn comments_connector() -> EventConnector {
    EventConnector::new("comments")
        .on("delete-comment", |scope, args| {
            let id = args.first().and_then(EventArg::as_int).unwrap_or_default();
            scope.log(
                LogRequest::new("comment #{id} deleted")
                    .arg("id", id)
                    .object(id as u64)
                    .context("comments", "deleted")
                    .context("posts", "updated"),
            )?;
            Ok(())
        })
        .on("spam_comment", |scope, _| {
            scope.log(LogRequest::new("comment marked as spam").context("comments", "spammed"))?;
            Ok(())
        })
        .listen("edit_comment")
        .with_links(|mut links, entry| {
            if let Some(id) = entry.object_id() {
                links.push(ActionLink::new("Restore", format!("/comments/{}/restore", id)));
            }
            links
        })
}

fn posts_connector() -> EventConnector {
    EventConnector::new("posts")
        .on("save_post", |scope, args| {
            let id = args.first().and_then(EventArg::as_int).unwrap_or_default();
            let handle = format!("post-{}", id);
            scope.delayed_log(
                handle,
                LogRequest::new("post {id} saved")
                    .arg("id", id)
                    .object(id as u64)
                    .context("posts", "updated"),
            );
            Ok(())
        })
        .on("publish_post", |scope, args| {
            let id = args.first().and_then(EventArg::as_int).unwrap_or_default();
            let handle = format!("post-{}", id);
            scope.delayed_log(
                handle,
                LogRequest::new("post {id} published")
                    .arg("id", id)
                    .object(id as u64)
                    .context("posts", "published"),
            );
            Ok(())
        })
}

fn pipeline(settings: ExclusionSettings) -> (Rc<VecSink>, AuditPipeline) {
    let sink = Rc::new(VecSink::new());
    let mut pipeline = AuditPipeline::new(settings, sink.clone());
    pipeline.register(comments_connector()).unwrap();
    pipeline.register(posts_connector()).unwrap();
    (sink, pipeline)
}

fn author() -> RequestMeta {
    RequestMeta::new("req-author")
        .with_actor(Actor::new(11).with_role("author"))
        .with_remote_addr("198.51.100.20")
}

#[test]
fn excluded_context_is_stripped_from_a_multi_context_event() {
    let (sink, pipeline) = pipeline(ExclusionSettings::new().exclude(Dimension::Contexts, "comments"));

    let mut session = pipeline.begin(author());
    assert_eq!(session.fire("delete-comment", &[EventArg::Int(5)]).unwrap(), 1);
    session.finish().unwrap();

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].connector(), "comments");
    assert_eq!(
        entries[0].contexts().iter().collect::<Vec<_>>(),
        [("posts", "updated")]
    );
    assert_eq!(entries[0].user_id(), Some(11));
    assert_eq!(entries[0].render(), "comment #5 deleted");
}

#[test]
fn fully_excluded_event_reaches_no_sink() {
    let (sink, pipeline) = pipeline(ExclusionSettings::new().exclude(Dimension::Actions, "spammed"));

    let mut session = pipeline.begin(author());
    assert_eq!(session.fire("spam_comment", &[]).unwrap(), 1);
    session.finish().unwrap();

    assert!(sink.is_empty());
}

#[test]
fn excluded_role_prevents_every_subscription() {
    let (sink, pipeline) = pipeline(
        ExclusionSettings::new().exclude(Dimension::AuthorsAndRoles, "editor"),
    );
    let editor = RequestMeta::new("req-editor").with_actor(Actor::new(12).with_role("editor"));

    let mut session = pipeline.begin(editor);

    assert_eq!(session.activation().subscription_count(), 0);
    assert!(session.activation().link_hooks().is_empty());
    assert_eq!(session.fire("delete-comment", &[EventArg::Int(1)]).unwrap(), 0);
    assert_eq!(session.fire("save_post", &[EventArg::Int(1)]).unwrap(), 0);
    session.finish().unwrap();

    assert!(sink.is_empty());
}

#[test]
fn excluded_user_id_shares_the_role_list() {
    let (sink, pipeline) = pipeline(ExclusionSettings::new().exclude(Dimension::AuthorsAndRoles, "11"));

    let mut session = pipeline.begin(author());
    session.fire("delete-comment", &[EventArg::Int(1)]).unwrap();
    session.finish().unwrap();

    assert!(sink.is_empty());
}

#[test]
fn anonymous_visitor_from_excluded_range_is_not_logged() {
    let (sink, pipeline) = pipeline(
        ExclusionSettings::new().exclude(Dimension::IpAddresses, "198.51.100.0/24"),
    );
    let visitor = RequestMeta::new("req-anon").with_remote_addr("198.51.100.77");

    let mut session = pipeline.begin(visitor);
    session.fire("spam_comment", &[]).unwrap();
    session.finish().unwrap();

    assert!(sink.is_empty());
}

#[test]
fn malformed_address_fails_open() {
    let (sink, pipeline) = pipeline(
        ExclusionSettings::new().exclude(Dimension::IpAddresses, "198.51.100.0/24"),
    );
    let visitor = RequestMeta::new("req-anon").with_remote_addr("198.51.100");

    let mut session = pipeline.begin(visitor);
    session.fire("spam_comment", &[]).unwrap();
    session.finish().unwrap();

    assert_eq!(sink.len(), 1);
    assert_eq!(sink.entries()[0].user_id(), None);
}

#[test]
fn override_hook_can_reinstate_an_excluded_user() {
    let sink = Rc::new(VecSink::new());
    let hook: RecordOverride = Rc::new(|verdict: bool, actor: Option<&Actor>, _connector: &str| {
        verdict || actor.map(|a| a.id) == Some(12)
    });
    let mut pipeline = AuditPipeline::new(
        ExclusionSettings::new().exclude(Dimension::AuthorsAndRoles, "editor"),
        sink.clone(),
    )
    .with_override(hook);
    pipeline.register(comments_connector()).unwrap();

    let chief = RequestMeta::new("r1").with_actor(Actor::new(12).with_role("editor"));
    let mut session = pipeline.begin(chief);
    session.fire("spam_comment", &[]).unwrap();
    session.finish().unwrap();

    let other = RequestMeta::new("r2").with_actor(Actor::new(13).with_role("editor"));
    let mut session = pipeline.begin(other);
    session.fire("spam_comment", &[]).unwrap();
    session.finish().unwrap();

    let requests: Vec<_> = sink
        .entries()
        .iter()
        .map(|e| e.request_id().to_string())
        .collect();
    assert_eq!(requests, ["r1"]);
}

#[test]
fn deferred_entries_commit_once_with_the_last_writer() {
    let (sink, pipeline) = pipeline(ExclusionSettings::new());

    let mut session = pipeline.begin(author());
    session.fire("save_post", &[EventArg::Int(7)]).unwrap();
    session.fire("publish_post", &[EventArg::Int(7)]).unwrap();
    session.fire("save_post", &[EventArg::Int(8)]).unwrap();
    assert!(sink.is_empty());
    assert!(session.unit().buffer().is_flush_scheduled());

    let report = session.finish().unwrap();

    assert_eq!(report.forwarded, 2);
    let messages: Vec<_> = sink.entries().iter().map(|e| e.render()).collect();
    assert_eq!(messages, ["post 7 published", "post 8 saved"]);
}

#[test]
fn records_in_one_request_link_to_their_predecessor() {
    let (sink, pipeline) = pipeline(ExclusionSettings::new());

    let mut session = pipeline.begin(author());
    session.fire("spam_comment", &[]).unwrap();
    session.fire("delete-comment", &[EventArg::Int(2)]).unwrap();
    session.finish().unwrap();

    let mut session = pipeline.begin(author());
    session.fire("spam_comment", &[]).unwrap();
    session.finish().unwrap();

    let previous: Vec<_> = sink.entries().iter().map(LogEntry::previous).collect();
    assert_eq!(previous, [None, Some(RecordId(1)), None]);
}

#[test]
fn unbound_and_unknown_events_are_ignored() {
    let (sink, pipeline) = pipeline(ExclusionSettings::new());

    let mut session = pipeline.begin(author());
    assert!(session.activation().is_subscribed("edit_comment"));
    assert_eq!(session.fire("edit_comment", &[]).unwrap(), 0);
    assert_eq!(session.fire("never_subscribed", &[]).unwrap(), 0);
    session.finish().unwrap();

    assert!(sink.is_empty());
}

#[test]
fn action_links_come_from_the_active_connector() {
    let (sink, pipeline) = pipeline(ExclusionSettings::new());

    let mut session = pipeline.begin(author());
    session.fire("delete-comment", &[EventArg::Int(9)]).unwrap();
    let entry = sink.entries().remove(0);
    let base = vec![ActionLink::new("Details", "/log/1")];

    let links = session.action_links("comments", base.clone(), &entry);
    let untouched = session.action_links("posts", base.clone(), &entry);
    session.finish().unwrap();

    assert_eq!(links.len(), 2);
    assert_eq!(links[1].url, "/comments/9/restore");
    assert_eq!(untouched, base);
}

struct LiveSettings {
    settings: RefCell<ExclusionSettings>,
}

impl ExclusionSource for LiveSettings {
    fn excluded_by_key(&self, dimension: Dimension) -> Vec<String> {
        self.settings.borrow().excluded_by_key(dimension)
    }
}

#[test]
fn settings_changes_apply_from_the_next_request() {
    let live = Rc::new(LiveSettings {
        settings: RefCell::new(ExclusionSettings::new()),
    });
    let sink = Rc::new(VecSink::new());
    let mut pipeline = AuditPipeline::new(live.clone(), sink.clone());
    pipeline.register(comments_connector()).unwrap();

    let mut session = pipeline.begin(author());
    session.fire("spam_comment", &[]).unwrap();
    live.settings
        .borrow_mut()
        .insert(Dimension::Contexts, "comments");
    // The running request keeps its snapshot
    session.fire("spam_comment", &[]).unwrap();
    session.finish().unwrap();
    assert_eq!(sink.len(), 2);

    let mut session = pipeline.begin(author());
    session.fire("spam_comment", &[]).unwrap();
    session.finish().unwrap();
    assert_eq!(sink.len(), 2);
}

struct FlakySink {
    inner: VecSink,
    fail_after: usize,
}

impl LogSink for FlakySink {
    fn log(&self, entry: &LogEntry) -> Result<Option<RecordId>, SinkError> {
        if self.inner.len() >= self.fail_after {
            return Err(SinkError::new(SinkErrorKind::Full).because("quota reached"));
        }
        self.inner.log(entry)
    }
}

#[test]
fn sink_failure_during_commit_propagates_and_stops() {
    let sink = Rc::new(FlakySink {
        inner: VecSink::new(),
        fail_after: 1,
    });
    let mut pipeline = AuditPipeline::new(ExclusionSettings::new(), sink.clone());
    pipeline.register(posts_connector()).unwrap();

    let mut session = pipeline.begin(author());
    for id in [1, 2, 3] {
        session.fire("save_post", &[EventArg::Int(id)]).unwrap();
    }
    let result = session.finish();

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        Error::Sink(ref e) if e.kind() == SinkErrorKind::Full && e.reason() == Some("quota reached")
    ));
    assert_eq!(
        err.to_string(),
        "Log sink failure: posts entry in req-author not recorded: sink full (quota reached)"
    );
    assert_eq!(sink.inner.len(), 1);
}

#[test]
fn sink_failure_during_an_event_reaches_the_host() {
    let sink = Rc::new(FlakySink {
        inner: VecSink::new(),
        fail_after: 0,
    });
    let mut pipeline = AuditPipeline::new(ExclusionSettings::new(), sink.clone());
    pipeline.register(comments_connector()).unwrap();

    let mut session = pipeline.begin(author());
    let err = session.fire("spam_comment", &[]).unwrap_err();

    assert!(matches!(err, Error::Sink(ref e) if e.kind() == SinkErrorKind::Full));
}
