use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use proptest::prelude::*;
use tokio::sync::Mutex;

use gatekeep_core::AppError;
use gatekeep_domain::AccountRole;

use crate::account_service::AccountService;
use crate::directory_ports::ACCOUNTS_COLLECTION;
use crate::test_support::{FakeDirectoryStore, FakeIdentityProvider};
use crate::user_messages::{ACCOUNT_DISABLED_MESSAGE, SIGN_IN_FAILED_MESSAGE};

use super::{
    RejectionReason, SessionController, SessionObserver, SessionState, SessionTransition,
};

struct Harness {
    store: Arc<FakeDirectoryStore>,
    provider: Arc<FakeIdentityProvider>,
    controller: Arc<SessionController>,
}

fn harness() -> Harness {
    let store = Arc::new(FakeDirectoryStore::default());
    let provider = Arc::new(FakeIdentityProvider::default());
    let controller = Arc::new(SessionController::new(
        provider.clone(),
        AccountService::new(store.clone()),
    ));
    Harness {
        store,
        provider,
        controller,
    }
}

#[derive(Default)]
struct RecordingObserver {
    transitions: Mutex<Vec<SessionTransition>>,
}

#[async_trait]
impl SessionObserver for RecordingObserver {
    async fn on_transition(&self, transition: &SessionTransition) {
        self.transitions.lock().await.push(transition.clone());
    }
}

#[tokio::test]
async fn first_sign_in_establishes_user_session() {
    let harness = harness();
    harness.provider.sign_in_as("u1").await;

    let session = harness
        .controller
        .sign_in()
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(session.role(), AccountRole::User);
    assert_eq!(session.identity().subject(), "u1");
    assert_eq!(session.identity().display_name(), "Display u1");
    assert_eq!(
        session.identity().avatar_url(),
        Some("https://avatars.example.com/u1.png")
    );
    assert_eq!(harness.controller.current_role().await, Some(AccountRole::User));
    assert!(harness.store.document(ACCOUNTS_COLLECTION, "u1").await.is_some());
    assert_eq!(harness.controller.last_error().await, None);
}

#[tokio::test]
async fn repeated_sign_in_preserves_the_existing_record() {
    let harness = harness();
    harness.store.seed_account("admin1", "admin", true).await;
    harness.provider.sign_in_as("admin1").await;

    let first = harness.controller.sign_in().await;
    assert!(first.is_ok());
    harness.controller.sign_out().await;
    let second = harness.controller.sign_in().await;

    assert_eq!(
        second.map(|session| session.role()).ok(),
        Some(AccountRole::Admin)
    );
    assert_eq!(harness.store.puts.load(Ordering::SeqCst), 0);
    assert_eq!(harness.store.len().await, 1);
}

#[tokio::test]
async fn disabled_account_is_rejected_and_credential_revoked() {
    let harness = harness();
    harness.store.seed_account("u1", "user", false).await;
    harness.provider.sign_in_as("u1").await;

    let result = harness.controller.sign_in().await;

    assert!(matches!(result, Err(AppError::AccountDisabled(_))));
    assert_eq!(
        harness.controller.state().await,
        SessionState::Rejected(RejectionReason::AccountDisabled)
    );
    assert_eq!(harness.controller.current_session().await, None);
    assert_eq!(harness.provider.terminate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        harness.controller.last_error().await,
        Some(ACCOUNT_DISABLED_MESSAGE)
    );
}

#[tokio::test]
async fn disabled_admin_is_rejected_too() {
    let harness = harness();
    harness.store.seed_account("admin1", "admin", false).await;
    harness.provider.sign_in_as("admin1").await;

    let result = harness.controller.sign_in().await;

    assert!(result.is_err());
    assert_eq!(harness.controller.current_role().await, None);
}

#[tokio::test]
async fn provider_failure_returns_to_signed_out_with_generic_message() {
    let harness = harness();
    harness.provider.fail_sign_in().await;

    let result = harness.controller.sign_in().await;

    assert!(matches!(result, Err(AppError::Provider(_))));
    assert_eq!(harness.controller.state().await, SessionState::SignedOut);
    assert_eq!(
        harness.controller.last_error().await,
        Some(SIGN_IN_FAILED_MESSAGE)
    );
    assert_eq!(harness.store.len().await, 0);
}

#[tokio::test]
async fn store_failure_during_sign_in_revokes_credential() {
    let harness = harness();
    harness.store.fail_reads.store(true, Ordering::SeqCst);
    harness.provider.sign_in_as("u1").await;

    let result = harness.controller.sign_in().await;

    assert!(matches!(result, Err(AppError::Store(_))));
    assert_eq!(harness.controller.state().await, SessionState::SignedOut);
    assert_eq!(harness.provider.terminate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        harness.controller.last_error().await,
        Some(SIGN_IN_FAILED_MESSAGE)
    );
}

#[tokio::test]
async fn successful_sign_in_clears_previous_error() {
    let harness = harness();
    harness.store.seed_account("u1", "user", false).await;
    harness.provider.sign_in_as("u1").await;
    let rejected = harness.controller.sign_in().await;
    assert!(rejected.is_err());

    harness.provider.sign_in_as("u2").await;
    let accepted = harness.controller.sign_in().await;

    assert!(accepted.is_ok());
    assert_eq!(harness.controller.last_error().await, None);
}

#[tokio::test]
async fn sign_out_succeeds_even_when_provider_fails() {
    let harness = harness();
    harness.provider.sign_in_as("u1").await;
    let signed_in = harness.controller.sign_in().await;
    assert!(signed_in.is_ok());
    harness.provider.fail_terminate.store(true, Ordering::SeqCst);

    harness.controller.sign_out().await;

    assert_eq!(harness.controller.state().await, SessionState::SignedOut);
    assert_eq!(harness.controller.current_session().await, None);
}

#[tokio::test]
async fn sign_out_from_rejected_clears_error() {
    let harness = harness();
    harness.store.seed_account("u1", "user", false).await;
    harness.provider.sign_in_as("u1").await;
    let rejected = harness.controller.sign_in().await;
    assert!(rejected.is_err());

    harness.controller.sign_out().await;

    assert_eq!(harness.controller.state().await, SessionState::SignedOut);
    assert_eq!(harness.controller.last_error().await, None);
}

#[tokio::test]
async fn sign_in_while_signed_in_is_a_conflict() {
    let harness = harness();
    harness.provider.sign_in_as("u1").await;
    let first = harness.controller.sign_in().await;
    assert!(first.is_ok());

    let second = harness.controller.sign_in().await;

    assert!(matches!(second, Err(AppError::Conflict(_))));
    assert_eq!(harness.provider.sign_in_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_sign_in_is_rejected_while_one_is_pending() {
    let harness = harness();
    harness.provider.sign_in_as("u1").await;
    let gate = harness.provider.hold_sign_in().await;

    let controller = Arc::clone(&harness.controller);
    let pending = tokio::spawn(async move { controller.sign_in().await });
    while !harness.controller.is_busy().await {
        tokio::task::yield_now().await;
    }

    let duplicate = harness.controller.sign_in().await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    gate.notify_one();
    let first = pending.await.unwrap_or_else(|_| unreachable!());
    assert!(first.is_ok());
    assert_eq!(harness.provider.sign_in_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sign_out_during_sign_in_abandons_the_attempt() {
    let harness = harness();
    harness.provider.sign_in_as("u1").await;
    let gate = harness.provider.hold_sign_in().await;

    let controller = Arc::clone(&harness.controller);
    let pending = tokio::spawn(async move { controller.sign_in().await });
    while !harness.controller.is_busy().await {
        tokio::task::yield_now().await;
    }

    harness.controller.sign_out().await;
    gate.notify_one();
    let abandoned = pending.await.unwrap_or_else(|_| unreachable!());

    assert!(matches!(abandoned, Err(AppError::Conflict(_))));
    assert_eq!(harness.controller.state().await, SessionState::SignedOut);
    // One terminate for the sign-out, one for the abandoned credential.
    assert_eq!(harness.provider.terminate_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn observers_see_every_transition_in_order() {
    let harness = harness();
    let observer = Arc::new(RecordingObserver::default());
    let weak: Weak<dyn SessionObserver> = Arc::downgrade(&observer) as Weak<dyn SessionObserver>;
    harness.controller.subscribe(weak).await;
    harness.store.seed_account("admin1", "admin", true).await;
    harness.provider.sign_in_as("admin1").await;

    let signed_in = harness.controller.sign_in().await;
    assert!(signed_in.is_ok());
    harness.controller.sign_out().await;

    let transitions = observer.transitions.lock().await;
    assert_eq!(transitions.len(), 3);
    assert_eq!(transitions[0].current, SessionState::Authenticating);
    assert!(transitions[1].entered_admin());
    assert_eq!(transitions[2].current, SessionState::SignedOut);
    assert!(transitions[2].previous.is_admin());
}

#[tokio::test]
async fn dropped_observers_are_not_called() {
    struct CountingObserver(Arc<AtomicUsize>);

    #[async_trait]
    impl SessionObserver for CountingObserver {
        async fn on_transition(&self, _transition: &SessionTransition) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let harness = harness();
    let calls = Arc::new(AtomicUsize::new(0));
    let observer = Arc::new(CountingObserver(Arc::clone(&calls)));
    let weak: Weak<dyn SessionObserver> = Arc::downgrade(&observer) as Weak<dyn SessionObserver>;
    harness.controller.subscribe(weak).await;
    drop(observer);

    harness.provider.sign_in_as("u1").await;
    let signed_in = harness.controller.sign_in().await;

    assert!(signed_in.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn never_seen_subjects_get_one_default_record(subject in "[a-z][a-z0-9]{0,15}", attempts in 1_usize..4) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap_or_else(|_| unreachable!());

        let (role, records, puts) = runtime.block_on(async {
            let harness = harness();
            harness.provider.sign_in_as(&subject).await;
            let mut role = None;
            for _ in 0..attempts {
                role = harness.controller.sign_in().await.ok().map(|session| session.role());
                harness.controller.sign_out().await;
            }
            (role, harness.store.len().await, harness.store.puts.load(Ordering::SeqCst))
        });

        prop_assert_eq!(role, Some(AccountRole::User));
        prop_assert_eq!(records, 1);
        prop_assert_eq!(puts, 1);
    }
}
