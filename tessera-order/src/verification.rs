use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use tessera_core::identity::{IdentityRejection, IdentityVerifier, VerifiedIdentity};
use tessera_core::ReservationError;

/// Verifies every identity token of one order concurrently.
///
/// One task is spawned per token and every task is joined before any result is
/// looked at, so a failing token never leaves sibling calls running. When
/// several tokens fail, the one that comes first in the order wins.
#[derive(Clone)]
pub struct IdentityFanOut {
    verifier: Arc<dyn IdentityVerifier>,
    call_timeout: Duration,
}

impl IdentityFanOut {
    pub fn new(verifier: Arc<dyn IdentityVerifier>, call_timeout: Duration) -> Self {
        Self { verifier, call_timeout }
    }

    /// Returns the verified identities in the same order as `tokens`.
    pub async fn verify_all(
        &self,
        tokens: &[String],
        adult_minimum_age: u32,
    ) -> Result<Vec<VerifiedIdentity>, ReservationError> {
        let mut seen = HashSet::with_capacity(tokens.len());
        if !tokens.iter().all(|token| seen.insert(token.as_str())) {
            return Err(ReservationError::DuplicateIdentityInPayload);
        }

        let mut tasks = JoinSet::new();
        for (index, token) in tokens.iter().cloned().enumerate() {
            let verifier = Arc::clone(&self.verifier);
            let call_timeout = self.call_timeout;
            tasks.spawn(async move {
                let result = match tokio::time::timeout(call_timeout, verifier.verify(&token)).await {
                    Ok(result) => result,
                    Err(_) => Err(IdentityRejection::ServiceUnavailable(format!(
                        "no answer within {}ms",
                        call_timeout.as_millis()
                    ))),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<VerifiedIdentity, IdentityRejection>>> = vec![None; tokens.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!("Identity verification task failed to complete: {}", e),
            }
        }

        let mut verified = Vec::with_capacity(tokens.len());
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Some(Ok(identity)) => verified.push(identity),
                Some(Err(rejection)) => {
                    debug!(index, %rejection, "Identity rejected");
                    return Err(ReservationError::IdentityVerificationFailed { index, rejection });
                }
                None => {
                    return Err(ReservationError::Internal(format!(
                        "identity verification for item {} did not complete",
                        index
                    )))
                }
            }
        }

        if !verified.iter().any(|identity| identity.age >= adult_minimum_age) {
            return Err(ReservationError::NoAdultInTransaction);
        }

        Ok(verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedRegistry {
        answers: HashMap<String, (Duration, Result<u32, IdentityRejection>)>,
        calls: AtomicUsize,
        finished: AtomicUsize,
    }

    impl ScriptedRegistry {
        fn new(answers: Vec<(&str, u64, Result<u32, IdentityRejection>)>) -> Arc<Self> {
            Arc::new(Self {
                answers: answers
                    .into_iter()
                    .map(|(token, delay, age)| (token.to_string(), (Duration::from_millis(delay), age)))
                    .collect(),
                calls: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl IdentityVerifier for ScriptedRegistry {
        async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityRejection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay, answer) = self.answers.get(token).cloned().unwrap_or((Duration::ZERO, Err(IdentityRejection::NotFound)));
            tokio::time::sleep(delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            answer.map(|age| VerifiedIdentity {
                token: token.to_string(),
                fans_id: format!("F-{}", token),
                display_name: token.to_uppercase(),
                email: format!("{}@example.com", token),
                phone_number: "+6281200000".to_string(),
                age,
            })
        }
    }

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn test_duplicate_tokens_fail_before_any_call() {
        let registry = ScriptedRegistry::new(vec![("a", 0, Ok(30))]);
        let fan_out = IdentityFanOut::new(registry.clone(), Duration::from_secs(1));

        let result = fan_out.verify_all(&tokens(&["a", "b", "a"]), 17).await;
        assert!(matches!(result, Err(ReservationError::DuplicateIdentityInPayload)));
        assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_results_keep_payload_order() {
        let registry = ScriptedRegistry::new(vec![("a", 30, Ok(30)), ("b", 0, Ok(12))]);
        let fan_out = IdentityFanOut::new(registry, Duration::from_secs(1));

        let verified = fan_out.verify_all(&tokens(&["a", "b"]), 17).await.unwrap();
        assert_eq!(verified[0].token, "a");
        assert_eq!(verified[1].token, "b");
    }

    #[tokio::test]
    async fn test_earliest_item_failure_wins_after_all_calls_finish() {
        let registry = ScriptedRegistry::new(vec![
            ("ok", 0, Ok(40)),
            ("blocked", 50, Err(IdentityRejection::Blacklisted)),
            ("gone", 0, Err(IdentityRejection::NotFound)),
        ]);
        let fan_out = IdentityFanOut::new(registry.clone(), Duration::from_secs(1));

        let result = fan_out.verify_all(&tokens(&["ok", "blocked", "gone"]), 17).await;
        match result {
            Err(ReservationError::IdentityVerificationFailed { index, rejection }) => {
                assert_eq!(index, 1);
                assert_eq!(rejection, IdentityRejection::Blacklisted);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(registry.finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_adult_check_runs_on_the_full_set() {
        // The adult answers last; an early exit on the first minor would reject.
        let registry = ScriptedRegistry::new(vec![("kid", 0, Ok(10)), ("parent", 40, Ok(41))]);
        let fan_out = IdentityFanOut::new(registry, Duration::from_secs(1));
        assert!(fan_out.verify_all(&tokens(&["kid", "parent"]), 17).await.is_ok());

        let registry = ScriptedRegistry::new(vec![("kid", 0, Ok(10)), ("teen", 0, Ok(16))]);
        let fan_out = IdentityFanOut::new(registry, Duration::from_secs(1));
        assert!(matches!(
            fan_out.verify_all(&tokens(&["kid", "teen"]), 17).await,
            Err(ReservationError::NoAdultInTransaction)
        ));
    }

    #[tokio::test]
    async fn test_slow_registry_is_service_unavailable() {
        let registry = ScriptedRegistry::new(vec![("slow", 500, Ok(30))]);
        let fan_out = IdentityFanOut::new(registry, Duration::from_millis(50));

        match fan_out.verify_all(&tokens(&["slow"]), 17).await {
            Err(ReservationError::IdentityVerificationFailed { index: 0, rejection }) => {
                assert!(rejection.is_transient());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
