//! Property tests for exclusion decisions and the deferred commit protocol.

use std::rc::Rc;

use audit_pipeline::{
    Actor, ContextMap, Dimension, ExclusionPolicy, ExclusionSettings, LogDispatcher, LogRequest,
    RequestMeta, UnitOfWork, VecSink,
};
use proptest::prelude::*;

fn arb_slug() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{2,8}").unwrap()
}

fn arb_actor() -> impl Strategy<Value = Actor> {
    (1u64..10_000, prop::collection::vec(arb_slug(), 0..4))
        .prop_map(|(id, roles)| Actor { id, roles })
}

fn unit(settings: ExclusionSettings) -> UnitOfWork {
    UnitOfWork::new(RequestMeta::new("req-prop"), ExclusionPolicy::new(settings))
}

proptest! {
    /// Property: any actor holding an excluded role is not logged.
    #[test]
    fn proptest_excluded_role_always_disables_user(
        actor in arb_actor(),
        excluded in arb_slug()
    ) {
        let mut actor = actor;
        actor.roles.push(excluded.clone());
        let policy = ExclusionPolicy::new(
            ExclusionSettings::new().exclude(Dimension::AuthorsAndRoles, excluded),
        );

        prop_assert!(!policy.is_logging_enabled_for_user(Some(&actor), "posts"));
    }

    /// Property: absent and id-0 actors are always logged.
    #[test]
    fn proptest_anonymous_user_always_enabled(
        roles in prop::collection::vec(arb_slug(), 0..4),
        excluded in prop::collection::vec(arb_slug(), 0..6)
    ) {
        let mut settings = ExclusionSettings::new().exclude(Dimension::AuthorsAndRoles, "0");
        for value in excluded {
            settings.insert(Dimension::AuthorsAndRoles, value);
        }
        let policy = ExclusionPolicy::new(settings);
        let anonymous = Actor { id: 0, roles };

        prop_assert!(policy.is_logging_enabled_for_user(None, "posts"));
        prop_assert!(policy.is_logging_enabled_for_user(Some(&anonymous), "posts"));
    }

    /// Property: strings that are not IP addresses never block logging.
    #[test]
    fn proptest_invalid_ip_fails_open(
        raw in prop::string::string_regex("[a-z ]{0,12}|[0-9]{1,3}\\.[0-9]{1,3}| [0-9]{1,3}(\\.[0-9]{1,3}){3}\n?").unwrap()
    ) {
        let policy = ExclusionPolicy::new(
            ExclusionSettings::new()
                .exclude(Dimension::IpAddresses, raw.clone())
                .exclude(Dimension::IpAddresses, "0.0.0.0/0")
                .exclude(Dimension::IpAddresses, "::/0"),
        );

        prop_assert!(policy.is_logging_enabled_for_ip(Some(&raw), None, "posts"));
    }

    /// Property: a request whose pairs are all excluded never reaches the sink.
    #[test]
    fn proptest_fully_excluded_request_is_dropped(
        pairs in prop::collection::vec((arb_slug(), arb_slug()), 1..6),
        exclude_contexts in any::<bool>()
    ) {
        let mut settings = ExclusionSettings::new();
        for (context, action) in &pairs {
            if exclude_contexts {
                settings.insert(Dimension::Contexts, context.clone());
            } else {
                settings.insert(Dimension::Actions, action.clone());
            }
        }
        let sink = Rc::new(VecSink::new());
        let dispatcher = LogDispatcher::new(sink.clone());
        let mut uow = unit(settings);
        let contexts: ContextMap = pairs.into_iter().collect();

        let forwarded = dispatcher
            .log(&mut uow, "posts", LogRequest::new("m").contexts_from(contexts))
            .unwrap();

        prop_assert!(!forwarded);
        prop_assert!(sink.is_empty());
    }

    /// Property: surviving pairs are forwarded exactly, in insertion order.
    #[test]
    fn proptest_surviving_subset_preserves_order(
        pairs in prop::collection::vec((arb_slug(), arb_slug()), 1..8),
        excluded_contexts in prop::collection::vec(arb_slug(), 0..4)
    ) {
        let mut settings = ExclusionSettings::new();
        for context in &excluded_contexts {
            settings.insert(Dimension::Contexts, context.clone());
        }
        let contexts: ContextMap = pairs.into_iter().collect();
        let expected: Vec<(String, String)> = contexts
            .iter()
            .filter(|(context, _)| !excluded_contexts.iter().any(|e| e == context))
            .map(|(c, a)| (c.to_string(), a.to_string()))
            .collect();

        let sink = Rc::new(VecSink::new());
        let dispatcher = LogDispatcher::new(sink.clone());
        let mut uow = unit(settings);
        dispatcher
            .log(&mut uow, "posts", LogRequest::new("m").contexts_from(contexts))
            .unwrap();

        if expected.is_empty() {
            prop_assert!(sink.is_empty());
        } else {
            let entries = sink.entries();
            prop_assert_eq!(entries.len(), 1);
            let forwarded: Vec<(String, String)> = entries[0]
                .contexts()
                .iter()
                .map(|(c, a)| (c.to_string(), a.to_string()))
                .collect();
            prop_assert_eq!(forwarded, expected);
        }
    }

    /// Property: many stores under one handle commit exactly once, with the last.
    #[test]
    fn proptest_deferred_last_writer_wins(
        messages in prop::collection::vec(arb_slug(), 1..10)
    ) {
        let sink = Rc::new(VecSink::new());
        let dispatcher = LogDispatcher::new(sink.clone());
        let mut uow = unit(ExclusionSettings::new());

        for message in &messages {
            uow.delayed_log("shared", "posts", LogRequest::new(message.clone()).context("posts", "updated"));
        }
        let report = uow.finish(&dispatcher).unwrap();

        prop_assert_eq!(report.forwarded, 1);
        prop_assert_eq!(sink.len(), 1);
        let entries = sink.entries();
        prop_assert_eq!(entries[0].message(), messages.last().unwrap().as_str());
    }
}
