//! Status - ジョブの状態と verb の許可表
//!
//! 2 つの静的な表を持つ:
//! - 状態遷移表: どの状態からどの状態へ移れるか
//! - verb 表: 外部コマンド（verb）がどの状態で受け付けられるか
//!
//! 表に無い遷移はプログラミングエラー（panic）。表に無い verb は
//! 呼び出し元へ返す通常のエラー（`JobError::VerbNotPermitted`）。

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a job.
///
/// ```text
/// Undefined ─▶ Created ─▶ Running ─▶ Ready ─▶ Waiting ─▶ Pending ─▶ Concluded ─▶ Null
///                 │         │  ▲       │  ▲      │          │           ▲
///                 │         ▼  │       ▼  │      └──▶ Aborting ◀───────┘
///                 │        Paused    Standby
///                 └──▶ Null (never started)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Placeholder before the job is inserted into a registry.
    Undefined,
    Created,
    Running,
    /// Blocked at a pause point.
    Paused,
    /// Reached its synchronisation point; may be completed by the user.
    Ready,
    /// Paused while `Ready`.
    Standby,
    /// Finished running, waiting for the rest of its transaction.
    Waiting,
    /// Waiting for an explicit `Finalize`.
    Pending,
    Aborting,
    /// Finalised; waiting for an explicit `Dismiss`.
    Concluded,
    /// Dismissed. Terminal.
    Null,
}

impl JobStatus {
    pub const COUNT: usize = 11;

    pub const ALL: [JobStatus; Self::COUNT] = [
        JobStatus::Undefined,
        JobStatus::Created,
        JobStatus::Running,
        JobStatus::Paused,
        JobStatus::Ready,
        JobStatus::Standby,
        JobStatus::Waiting,
        JobStatus::Pending,
        JobStatus::Aborting,
        JobStatus::Concluded,
        JobStatus::Null,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Is the move `self -> to` in the transition table?
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        TRANSITIONS[self.index()][to.index()]
    }

    /// Has the job stopped running (successfully or not)?
    pub fn is_completed(self) -> bool {
        matches!(
            self,
            JobStatus::Waiting
                | JobStatus::Pending
                | JobStatus::Aborting
                | JobStatus::Concluded
                | JobStatus::Null
        )
    }

    pub fn is_ready(self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Standby)
    }

    pub fn is_terminal(self) -> bool {
        self == JobStatus::Null
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Undefined => "undefined",
            JobStatus::Created => "created",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Ready => "ready",
            JobStatus::Standby => "standby",
            JobStatus::Waiting => "waiting",
            JobStatus::Pending => "pending",
            JobStatus::Aborting => "aborting",
            JobStatus::Concluded => "concluded",
            JobStatus::Null => "null",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally issued command.
///
/// The wire names (`cancel`, `pause`, `resume`, `set-speed`, `complete`,
/// `finalize`, `dismiss`) are shared with existing front ends and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobVerb {
    Cancel,
    Pause,
    Resume,
    SetSpeed,
    Complete,
    Finalize,
    Dismiss,
}

impl JobVerb {
    pub const COUNT: usize = 7;

    pub const ALL: [JobVerb; Self::COUNT] = [
        JobVerb::Cancel,
        JobVerb::Pause,
        JobVerb::Resume,
        JobVerb::SetSpeed,
        JobVerb::Complete,
        JobVerb::Finalize,
        JobVerb::Dismiss,
    ];

    /// Is this verb accepted while the job is in `status`?
    pub fn is_allowed_in(self, status: JobStatus) -> bool {
        VERBS[self as usize][status.index()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobVerb::Cancel => "cancel",
            JobVerb::Pause => "pause",
            JobVerb::Resume => "resume",
            JobVerb::SetSpeed => "set-speed",
            JobVerb::Complete => "complete",
            JobVerb::Finalize => "finalize",
            JobVerb::Dismiss => "dismiss",
        }
    }
}

impl fmt::Display for JobVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const T: bool = true;
const F: bool = false;

// Row = from, column = to. Column order follows `JobStatus::ALL`.
#[rustfmt::skip]
const TRANSITIONS: [[bool; JobStatus::COUNT]; JobStatus::COUNT] = [
    //            U  C  R  P  Y  S  W  D  X  E  N
    /* U */      [F, T, F, F, F, F, F, F, F, F, F],
    /* C */      [F, F, T, F, F, F, F, F, T, F, T],
    /* R */      [F, F, F, T, T, F, T, F, T, F, F],
    /* P */      [F, F, T, F, F, F, F, F, F, F, F],
    /* Y */      [F, F, F, F, F, T, T, F, T, F, F],
    /* S */      [F, F, F, F, T, F, F, F, F, F, F],
    /* W */      [F, F, F, F, F, F, F, T, T, F, F],
    /* D */      [F, F, F, F, F, F, F, F, T, T, F],
    /* X */      [F, F, F, F, F, F, F, F, F, T, F],
    /* E */      [F, F, F, F, F, F, F, F, F, F, T],
    /* N */      [F, F, F, F, F, F, F, F, F, F, F],
];

#[rustfmt::skip]
const VERBS: [[bool; JobStatus::COUNT]; JobVerb::COUNT] = [
    //                U  C  R  P  Y  S  W  D  X  E  N
    /* Cancel */     [F, T, T, T, T, T, T, T, F, F, F],
    /* Pause */      [F, T, T, T, T, T, F, F, F, F, F],
    /* Resume */     [F, T, T, T, T, T, F, F, F, F, F],
    /* SetSpeed */   [F, T, T, T, T, T, F, F, F, F, F],
    /* Complete */   [F, F, F, F, T, F, F, F, F, F, F],
    /* Finalize */   [F, F, F, F, F, F, F, T, F, F, F],
    /* Dismiss */    [F, F, F, F, F, F, F, F, F, T, F],
];

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    use JobStatus::*;

    #[test]
    fn status_order_matches_table_columns() {
        for (i, status) in JobStatus::ALL.iter().enumerate() {
            assert_eq!(status.index(), i);
        }
        for (i, verb) in JobVerb::ALL.iter().enumerate() {
            assert_eq!(*verb as usize, i);
        }
    }

    #[test]
    fn every_non_terminal_status_has_an_exit() {
        for from in JobStatus::ALL {
            let exits = JobStatus::ALL
                .iter()
                .filter(|to| from.can_transition_to(**to))
                .count();
            if from.is_terminal() {
                assert_eq!(exits, 0, "{from} must be terminal");
            } else {
                assert!(exits > 0, "{from} has no outgoing edge");
            }
        }
    }

    #[test]
    fn null_is_reachable_from_every_status_but_undefined() {
        // Undefined -> Created is the only way in; everything else must be able to finish.
        for start in JobStatus::ALL {
            if start == Undefined || start == Null {
                continue;
            }
            let mut seen = vec![start];
            let mut frontier = vec![start];
            while let Some(s) = frontier.pop() {
                for to in JobStatus::ALL {
                    if s.can_transition_to(to) && !seen.contains(&to) {
                        seen.push(to);
                        frontier.push(to);
                    }
                }
            }
            assert!(seen.contains(&Null), "{start} cannot reach null");
        }
    }

    #[rstest]
    #[case(Undefined, Created)]
    #[case(Created, Running)]
    #[case(Created, Aborting)]
    #[case(Created, Null)]
    #[case(Running, Paused)]
    #[case(Running, Ready)]
    #[case(Running, Waiting)]
    #[case(Running, Aborting)]
    #[case(Paused, Running)]
    #[case(Ready, Standby)]
    #[case(Ready, Waiting)]
    #[case(Ready, Aborting)]
    #[case(Standby, Ready)]
    #[case(Waiting, Pending)]
    #[case(Waiting, Aborting)]
    #[case(Pending, Aborting)]
    #[case(Pending, Concluded)]
    #[case(Aborting, Concluded)]
    #[case(Concluded, Null)]
    fn legal_transitions(#[case] from: JobStatus, #[case] to: JobStatus) {
        assert!(from.can_transition_to(to));
    }

    #[test]
    fn table_has_exactly_the_legal_edges() {
        let count = JobStatus::ALL
            .iter()
            .flat_map(|from| JobStatus::ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .count();
        assert_eq!(count, 19);
    }

    #[rstest]
    #[case(Paused, Created)]
    #[case(Aborting, Aborting)]
    #[case(Running, Running)]
    #[case(Standby, Running)]
    #[case(Concluded, Created)]
    #[case(Null, Created)]
    fn illegal_transitions(#[case] from: JobStatus, #[case] to: JobStatus) {
        assert!(!from.can_transition_to(to));
    }

    #[rstest]
    #[case(JobVerb::Cancel, &[Created, Running, Paused, Ready, Standby, Waiting, Pending])]
    #[case(JobVerb::Pause, &[Created, Running, Paused, Ready, Standby])]
    #[case(JobVerb::Resume, &[Created, Running, Paused, Ready, Standby])]
    #[case(JobVerb::SetSpeed, &[Created, Running, Paused, Ready, Standby])]
    #[case(JobVerb::Complete, &[Ready])]
    #[case(JobVerb::Finalize, &[Pending])]
    #[case(JobVerb::Dismiss, &[Concluded])]
    fn verb_table(#[case] verb: JobVerb, #[case] allowed: &[JobStatus]) {
        for status in JobStatus::ALL {
            assert_eq!(
                verb.is_allowed_in(status),
                allowed.contains(&status),
                "{verb} in {status}"
            );
        }
    }

    #[test]
    fn no_verb_applies_to_undefined_or_null() {
        for verb in JobVerb::ALL {
            assert!(!verb.is_allowed_in(Undefined));
            assert!(!verb.is_allowed_in(Null));
        }
    }

    #[test]
    fn verb_names_are_stable_on_the_wire() {
        let names: Vec<String> = JobVerb::ALL
            .iter()
            .map(|v| serde_json::to_string(v).unwrap())
            .collect();
        assert_eq!(
            names,
            [
                "\"cancel\"",
                "\"pause\"",
                "\"resume\"",
                "\"set-speed\"",
                "\"complete\"",
                "\"finalize\"",
                "\"dismiss\""
            ]
        );
        assert_eq!(serde_json::to_string(&Standby).unwrap(), "\"standby\"");
    }

    #[test]
    fn completed_and_ready_classification() {
        assert!(!Running.is_completed());
        assert!(!Standby.is_completed());
        assert!(Waiting.is_completed());
        assert!(Null.is_completed());
        assert!(Ready.is_ready());
        assert!(Standby.is_ready());
        assert!(!Paused.is_ready());
    }
}
