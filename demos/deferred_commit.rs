//! Deferred commit demonstration.
//!
//! This example shows how several handlers refine one record during a
//! request and how it is committed once when the request ends:
//! 1. Saving a post stores a deferred entry under the post's handle
//! 2. Publishing the same post replaces that entry
//! 3. Finishing the request forwards one record per handle
//!
//! Run with: `cargo run --example deferred_commit`

use std::rc::Rc;

use audit_pipeline::{
    Actor, AuditPipeline, EventArg, EventConnector, ExclusionSettings, LogRequest, RequestMeta,
    VecSink,
};

fn posts() -> EventConnector {
    EventConnector::new("posts")
        .on("save_post", |scope, args| {
            let id = args.first().and_then(EventArg::as_int).unwrap_or_default();
            scope.delayed_log(
                format!("post-{}", id),
                LogRequest::new("post {id} saved")
                    .arg("id", id)
                    .object(id as u64)
                    .context("posts", "updated"),
            );
            Ok(())
        })
        .on("transition_post_status", |scope, args| {
            let id = args.first().and_then(EventArg::as_int).unwrap_or_default();
            let status = args.get(1).and_then(EventArg::as_str).unwrap_or("draft");
            scope.delayed_log(
                format!("post-{}", id),
                LogRequest::new("post {id} moved to {status}")
                    .arg("id", id)
                    .arg("status", status)
                    .object(id as u64)
                    .context("posts", status),
            );
            Ok(())
        })
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    println!("=== Deferred Commit Example ===\n");

    let sink = Rc::new(VecSink::new());
    let mut pipeline = AuditPipeline::new(ExclusionSettings::new(), sink.clone());
    if let Err(e) = pipeline.register(posts()) {
        println!("✗ Registration failed: {}", e);
        return;
    }

    let meta = RequestMeta::new("req-publish").with_actor(Actor::new(5).with_role("author"));
    let mut session = pipeline.begin(meta);

    let events: [(&str, Vec<EventArg>); 3] = [
        ("save_post", vec![EventArg::Int(40)]),
        ("transition_post_status", vec![EventArg::Int(40), "publish".into()]),
        ("save_post", vec![EventArg::Int(41)]),
    ];
    for (event, args) in &events {
        if let Err(e) = session.fire(event, args) {
            println!("✗ {} failed: {}", event, e);
            return;
        }
        println!(
            "• {} → {} pending handle(s), sink holds {}",
            event,
            session.unit().buffer().len(),
            sink.len()
        );
    }

    match session.finish() {
        Ok(report) => println!(
            "\n✓ Committed: {} forwarded, {} dropped",
            report.forwarded, report.dropped
        ),
        Err(e) => println!("\n✗ Commit failed: {}", e),
    }

    println!("\n--- Recorded entries ---");
    sink.with_entries(|entries| {
        for entry in entries {
            println!("{}  {}", entry, entry.render());
        }
    });

    println!("\n=== Example Complete ===");
}
