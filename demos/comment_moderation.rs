//! Comment moderation demonstration.
//!
//! This example shows how exclusion settings shape what gets recorded:
//! 1. A context excluded globally is stripped from multi-context events
//! 2. An excluded role keeps every connector from subscribing
//! 3. A malformed client address never blocks logging
//!
//! Run with: `cargo run --example comment_moderation`

use std::rc::Rc;

use audit_pipeline::{
    Actor, AuditPipeline, Dimension, EventArg, EventConnector, ExclusionSettings, LogRequest,
    RequestMeta, TracingSink,
};

fn comments() -> EventConnector {
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
        .on("approve-comment", |scope, args| {
            let id = args.first().and_then(EventArg::as_int).unwrap_or_default();
            scope.log(
                LogRequest::new("comment #{id} approved")
                    .arg("id", id)
                    .object(id as u64)
                    .context("comments", "approved"),
            )?;
            Ok(())
        })
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Comment Moderation Example ===\n");

    let settings = ExclusionSettings::new()
        .exclude(Dimension::Contexts, "comments")
        .exclude(Dimension::AuthorsAndRoles, "editor");
    let mut pipeline = AuditPipeline::new(settings, Rc::new(TracingSink::new()));
    if let Err(e) = pipeline.register(comments()) {
        println!("✗ Registration failed: {}", e);
        return;
    }

    // Scenario 1: the "comments" context is dropped, "posts" survives
    println!("--- Scenario 1: Author deletes a comment ---");
    let author = RequestMeta::new("req-001")
        .with_actor(Actor::new(21).with_role("author"))
        .with_remote_addr("198.51.100.4");
    let mut session = pipeline.begin(author);
    match session.fire("delete-comment", &[EventArg::Int(310)]) {
        Ok(n) => println!("✓ {} handler(s) ran; only the posts context is recorded", n),
        Err(e) => println!("✗ {}", e),
    }
    // Approval touches only the excluded context, so nothing is recorded
    match session.fire("approve-comment", &[EventArg::Int(311)]) {
        Ok(n) => println!("✓ {} handler(s) ran; approval fully excluded", n),
        Err(e) => println!("✗ {}", e),
    }
    if let Err(e) = session.finish() {
        println!("✗ {}", e);
    }

    // Scenario 2: editors are excluded before any subscription happens
    println!("\n--- Scenario 2: Editor deletes a comment ---");
    let editor = RequestMeta::new("req-002").with_actor(Actor::new(22).with_role("editor"));
    let mut session = pipeline.begin(editor);
    println!(
        "Subscriptions for this request: {}",
        session.activation().subscription_count()
    );
    match session.fire("delete-comment", &[EventArg::Int(312)]) {
        Ok(n) => println!("✓ {} handler(s) ran", n),
        Err(e) => println!("✗ {}", e),
    }
    if let Err(e) = session.finish() {
        println!("✗ {}", e);
    }

    // Scenario 3: an unparseable address is treated as eligible
    println!("\n--- Scenario 3: Anonymous visitor behind a broken proxy ---");
    let visitor = RequestMeta::new("req-003").with_remote_addr("unknown");
    let mut session = pipeline.begin(visitor);
    match session.fire("delete-comment", &[EventArg::Int(313)]) {
        Ok(n) => println!("✓ {} handler(s) ran; address could not be classified", n),
        Err(e) => println!("✗ {}", e),
    }
    if let Err(e) = session.finish() {
        println!("✗ {}", e);
    }

    println!("\n=== Example Complete ===");
}
