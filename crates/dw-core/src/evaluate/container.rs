//! Container retention rules.

use super::{DecisionSet, Reason, Verdict};
use crate::inventory::ContainerSnapshot;
use dw_common::{trim_slashes, ContainerId, ContainerRecord};
use dw_config::RetentionPolicy;

fn keep_listed<'p>(container: &ContainerRecord, keep: &'p [String]) -> Option<&'p str> {
    container.trimmed_names().find_map(|name| {
        keep.iter()
            .find(|entry| trim_slashes(entry) == name)
            .map(String::as_str)
    })
}

/// Decide every container in `snapshot` against `policy` at `now`.
pub fn evaluate_containers(
    snapshot: &ContainerSnapshot,
    policy: &RetentionPolicy,
    now: i64,
) -> DecisionSet<ContainerId> {
    let lifetime = policy.container_lifetime();
    let mut decisions = DecisionSet::new();

    for container in snapshot.containers() {
        let mut verdict = if !container.state.is_removal_candidate() {
            Verdict::keep(Reason::NotEligible {
                state: container.state.to_string(),
            })
        } else {
            match container.finished_at {
                None => Verdict::keep(Reason::NeverFinished),
                Some(finished) => {
                    let age_secs = now.saturating_sub(finished);
                    if finished.saturating_add(lifetime) < now {
                        Verdict::remove(Reason::Expired { age_secs })
                    } else {
                        Verdict::keep(Reason::WithinLifetime { age_secs })
                    }
                }
            }
        };

        if let Some(entry) = keep_listed(container, &policy.keep_containers) {
            verdict = Verdict::keep(Reason::KeepListed {
                entry: entry.to_string(),
            });
        }

        decisions.insert(container.id.clone(), verdict);
    }
    decisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::Decision;
    use crate::runtime::container_fixture;
    use dw_common::ContainerState;

    const NOW: i64 = 1_700_000_000;

    fn finished(id: &str, state: ContainerState, name: &str, at: Option<i64>) -> ContainerRecord {
        let mut c = container_fixture(id, state, name, "img");
        c.finished_at = at;
        c
    }

    fn policy() -> RetentionPolicy {
        RetentionPolicy::default().with_container_lifetime(259_200)
    }

    #[test]
    fn keep_listed_name_overrides_age() {
        let snap = ContainerSnapshot::from_records(vec![finished(
            "x",
            ContainerState::Exited,
            "web-1",
            Some(NOW - 500_000),
        )]);
        let set = evaluate_containers(&snap, &policy().keep_container("web-1"), NOW);
        assert_eq!(
            set.get(&ContainerId::new("x")).unwrap().reason,
            Reason::KeepListed {
                entry: "web-1".into()
            }
        );
    }

    #[test]
    fn keep_entry_slashes_are_trimmed() {
        let snap = ContainerSnapshot::from_records(vec![finished(
            "x",
            ContainerState::Exited,
            "web-1",
            Some(NOW - 500_000),
        )]);
        let set = evaluate_containers(&snap, &policy().keep_container("/web-1/"), NOW);
        assert_eq!(set.decision(&ContainerId::new("x")), Some(Decision::Keep));
    }

    #[test]
    fn only_exited_and_created_are_eligible() {
        let old = Some(NOW - 500_000);
        let snap = ContainerSnapshot::from_records(vec![
            finished("run", ContainerState::Running, "a", old),
            finished("pause", ContainerState::Paused, "b", old),
            finished("dead", ContainerState::Dead, "c", old),
            finished("exit", ContainerState::Exited, "d", old),
            finished("new", ContainerState::Created, "e", old),
        ]);
        let set = evaluate_containers(&snap, &policy(), NOW);
        let removed: Vec<_> = set.removals().map(|id| id.as_str()).collect();
        assert_eq!(removed, vec!["exit", "new"]);
        assert_eq!(
            set.get(&ContainerId::new("run")).unwrap().reason,
            Reason::NotEligible {
                state: "running".into()
            }
        );
    }

    #[test]
    fn missing_finish_time_is_kept() {
        let snap = ContainerSnapshot::from_records(vec![finished(
            "x",
            ContainerState::Created,
            "fresh",
            None,
        )]);
        let set = evaluate_containers(&snap, &policy(), NOW);
        assert_eq!(
            set.get(&ContainerId::new("x")).unwrap().reason,
            Reason::NeverFinished
        );
    }

    #[test]
    fn recent_container_is_kept() {
        let snap = ContainerSnapshot::from_records(vec![finished(
            "x",
            ContainerState::Exited,
            "job",
            Some(NOW - 259_200),
        )]);
        let set = evaluate_containers(&snap, &policy(), NOW);
        assert_eq!(
            set.get(&ContainerId::new("x")).unwrap().reason,
            Reason::WithinLifetime { age_secs: 259_200 }
        );
    }
}
