use std::{
    cmp::Reverse,
    collections::HashSet,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::{
    models::{
        AnswerChoice, AnswerEntity, Difficulty, GameParticipantEntity, GameQuestionEntity,
        GameSessionEntity, ParticipantEntity, QuestionEntity, RoundStatus, SessionStatus,
    },
    storage::StorageError,
};

/// Number of seats in every session.
pub const PARTICIPANTS_PER_SESSION: usize = 3;

/// Why a participant selection cannot seed a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("a session requires exactly {PARTICIPANTS_PER_SESSION} participants, got {0}")]
    WrongCount(usize),
    #[error("participant `{0}` was selected more than once")]
    Duplicate(Uuid),
}

/// Reason reported to a player whose answer was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Error)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The answer window of the round is closed.
    #[error("answer submitted after the round closed")]
    Late,
    /// The participant already answered this question.
    #[error("participant already answered this question")]
    Duplicate,
    /// The question is not the one currently asked.
    #[error("question is not the current question")]
    WrongQuestion,
}

/// Failure to record an answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    #[error("participant `{0}` is not seated in this session")]
    NotSeated(Uuid),
    #[error(transparent)]
    Rejected(RejectReason),
}

/// Point award policy applied to correct answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRules {
    /// Flat award for a correct answer.
    pub points_per_correct_answer: u32,
    /// Upper bound of the speed bonus, scaled by the share of the window left.
    pub max_time_bonus: u32,
}

impl ScoringRules {
    /// Points earned by a correct answer recorded with `remaining` out of `window` left.
    pub fn award(&self, remaining: Duration, window: Duration) -> u32 {
        let bonus = if self.max_time_bonus == 0 || window.is_zero() {
            0
        } else {
            let ratio = remaining.min(window).as_millis() * u128::from(self.max_time_bonus)
                / window.as_millis();
            u32::try_from(ratio).unwrap_or(self.max_time_bonus)
        };
        self.points_per_correct_answer.saturating_add(bonus)
    }
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            points_per_correct_answer: 10,
            max_time_bonus: 0,
        }
    }
}

/// Seat of a participant inside a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameParticipant {
    /// Seat identifier, scoped to the session.
    pub id: Uuid,
    /// Registry identifier of the participant.
    pub participant_id: Uuid,
    pub name: String,
    /// Accumulated score; never decreases.
    pub score: u32,
    /// Seat position (1..=3), also the tie-break order.
    pub position: u8,
    pub joined_at: SystemTime,
    pub left_at: Option<SystemTime>,
}

/// Question drawn from the bank for a given round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameQuestion {
    pub id: Uuid,
    pub theme_id: Option<Uuid>,
    pub text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub correct_answer: AnswerChoice,
    pub difficulty: Difficulty,
    pub round_number: u32,
}

impl GameQuestion {
    /// Freeze a bank question as the question of `round_number`.
    pub fn from_bank(question: QuestionEntity, round_number: u32) -> Self {
        Self {
            id: question.id,
            theme_id: question.theme_id,
            text: question.text,
            option_a: question.option_a,
            option_b: question.option_b,
            option_c: question.option_c,
            correct_answer: question.correct_answer,
            difficulty: question.difficulty,
            round_number,
        }
    }
}

/// Answer kept on the session for duplicate detection and auditing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAnswer {
    pub participant_id: Uuid,
    pub question_id: Uuid,
    pub round: u32,
    pub answer: AnswerChoice,
    pub correct: bool,
    pub points: u32,
    pub answered_at: SystemTime,
}

/// Aggregate state of one three-player session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    pub id: Uuid,
    pub status: SessionStatus,
    pub theme_id: Option<Uuid>,
    pub current_round: u32,
    pub total_rounds: u32,
    pub started_at: SystemTime,
    pub ended_at: Option<SystemTime>,
    /// Always exactly [`PARTICIPANTS_PER_SESSION`] seats, ordered by position.
    pub participants: Vec<GameParticipant>,
    pub round_status: RoundStatus,
    pub current_question: Option<GameQuestion>,
    pub round_start_time: Option<SystemTime>,
    pub round_end_time: Option<SystemTime>,
    pub asked_question_ids: Vec<Uuid>,
    pub answers: Vec<RecordedAnswer>,
    pub winner_id: Option<Uuid>,
}

/// Check that `ids` is a valid seating: exactly three distinct participants.
pub fn validate_selection(ids: &[Uuid]) -> Result<(), SelectionError> {
    if ids.len() != PARTICIPANTS_PER_SESSION {
        return Err(SelectionError::WrongCount(ids.len()));
    }

    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(*id) {
            return Err(SelectionError::Duplicate(*id));
        }
    }

    Ok(())
}

impl GameSession {
    /// Seat the given participants (positions follow input order) in a fresh active session.
    pub fn new(
        participants: Vec<ParticipantEntity>,
        theme_id: Option<Uuid>,
        total_rounds: u32,
        now: SystemTime,
    ) -> Result<Self, SelectionError> {
        let ids: Vec<Uuid> = participants.iter().map(|p| p.id).collect();
        validate_selection(&ids)?;

        let participants = participants
            .into_iter()
            .zip(1u8..)
            .map(|(participant, position)| GameParticipant {
                id: Uuid::new_v4(),
                participant_id: participant.id,
                name: participant.name,
                score: 0,
                position,
                joined_at: now,
                left_at: None,
            })
            .collect();

        Ok(Self {
            id: Uuid::new_v4(),
            status: SessionStatus::Active,
            theme_id,
            current_round: 1,
            total_rounds,
            started_at: now,
            ended_at: None,
            participants,
            round_status: RoundStatus::Waiting,
            current_question: None,
            round_start_time: None,
            round_end_time: None,
            asked_question_ids: Vec::new(),
            answers: Vec::new(),
            winner_id: None,
        })
    }

    /// Registry identifiers of the seated participants, in seat order.
    pub fn participant_ids(&self) -> Vec<Uuid> {
        self.participants
            .iter()
            .map(|participant| participant.participant_id)
            .collect()
    }

    pub fn is_seated(&self, participant_id: Uuid) -> bool {
        self.participants
            .iter()
            .any(|participant| participant.participant_id == participant_id)
    }

    pub fn is_last_round(&self) -> bool {
        self.current_round >= self.total_rounds
    }

    /// Open the answer window of `round` with `question`.
    pub fn begin_round(
        &mut self,
        round: u32,
        question: GameQuestion,
        now: SystemTime,
        duration: Duration,
    ) {
        self.current_round = round;
        self.round_status = RoundStatus::Active;
        self.asked_question_ids.push(question.id);
        self.current_question = Some(question);
        self.round_start_time = Some(now);
        self.round_end_time = Some(now + duration);
    }

    /// Time left in the answer window at `now`; zero once the round is no longer active.
    pub fn time_remaining(&self, now: SystemTime) -> Duration {
        if self.round_status != RoundStatus::Active {
            return Duration::ZERO;
        }
        self.round_end_time
            .and_then(|end| end.duration_since(now).ok())
            .unwrap_or(Duration::ZERO)
    }

    fn round_window(&self) -> Duration {
        match (self.round_start_time, self.round_end_time) {
            (Some(start), Some(end)) => end.duration_since(start).unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    fn has_answered(&self, participant_id: Uuid, question_id: Uuid) -> bool {
        self.answers.iter().any(|answer| {
            answer.participant_id == participant_id && answer.question_id == question_id
        })
    }

    /// Record an answer for the current question, crediting the participant when correct.
    ///
    /// Duplicates are reported as such even after the window closed, so retrying a
    /// rejected answer always yields the same reason.
    pub fn record_answer(
        &mut self,
        participant_id: Uuid,
        question_id: Uuid,
        answer: AnswerChoice,
        now: SystemTime,
        scoring: &ScoringRules,
    ) -> Result<RecordedAnswer, AnswerError> {
        if !self.is_seated(participant_id) {
            return Err(AnswerError::NotSeated(participant_id));
        }

        let Some(question) = self
            .current_question
            .as_ref()
            .filter(|question| question.id == question_id)
        else {
            return Err(AnswerError::Rejected(RejectReason::WrongQuestion));
        };

        if self.has_answered(participant_id, question_id) {
            return Err(AnswerError::Rejected(RejectReason::Duplicate));
        }

        let within_window = self.round_end_time.is_some_and(|end| now <= end);
        if self.round_status != RoundStatus::Active || !within_window {
            return Err(AnswerError::Rejected(RejectReason::Late));
        }

        let correct = question.correct_answer == answer;
        let points = if correct {
            scoring.award(self.time_remaining(now), self.round_window())
        } else {
            0
        };

        let recorded = RecordedAnswer {
            participant_id,
            question_id,
            round: self.current_round,
            answer,
            correct,
            points,
            answered_at: now,
        };

        if let Some(seat) = self
            .participants
            .iter_mut()
            .find(|participant| participant.participant_id == participant_id)
        {
            seat.score = seat.score.saturating_add(points);
        }
        self.answers.push(recorded.clone());

        Ok(recorded)
    }

    /// Number of seats that answered the current question.
    pub fn answered_count(&self) -> usize {
        let Some(question) = self.current_question.as_ref() else {
            return 0;
        };
        self.participants
            .iter()
            .filter(|participant| self.has_answered(participant.participant_id, question.id))
            .count()
    }

    pub fn all_answered(&self) -> bool {
        self.answered_count() == self.participants.len()
    }

    /// Close the answer window of the current round.
    pub fn finish_round(&mut self, now: SystemTime) {
        self.round_status = RoundStatus::Finished;
        if self.round_end_time.is_none_or(|end| now < end) {
            self.round_end_time = Some(now);
        }
    }

    /// Seats ordered by final rank: highest score first, ties by lowest position.
    pub fn standings(&self) -> Vec<&GameParticipant> {
        let mut ranked: Vec<&GameParticipant> = self.participants.iter().collect();
        ranked.sort_by_key(|participant| (Reverse(participant.score), participant.position));
        ranked
    }

    /// Seat currently leading the session.
    pub fn leader(&self) -> Option<&GameParticipant> {
        self.standings().into_iter().next()
    }

    /// Archive the session and return the registry identifier of the winner.
    pub fn finish(&mut self, now: SystemTime) -> Option<Uuid> {
        if self.round_status == RoundStatus::Active {
            self.finish_round(now);
        }
        self.status = SessionStatus::Finished;
        self.ended_at = Some(now);
        for participant in &mut self.participants {
            participant.left_at = Some(now);
        }
        self.winner_id = self.leader().map(|winner| winner.participant_id);
        self.winner_id
    }

    /// Wall-clock length of a finished session.
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at
            .and_then(|end| end.duration_since(self.started_at).ok())
    }
}

impl From<GameParticipantEntity> for GameParticipant {
    fn from(value: GameParticipantEntity) -> Self {
        Self {
            id: value.id,
            participant_id: value.participant_id,
            name: value.name,
            score: value.score,
            position: value.position,
            joined_at: value.joined_at,
            left_at: value.left_at,
        }
    }
}

impl From<GameParticipant> for GameParticipantEntity {
    fn from(value: GameParticipant) -> Self {
        Self {
            id: value.id,
            participant_id: value.participant_id,
            name: value.name,
            score: value.score,
            position: value.position,
            joined_at: value.joined_at,
            left_at: value.left_at,
        }
    }
}

impl From<GameQuestionEntity> for GameQuestion {
    fn from(value: GameQuestionEntity) -> Self {
        Self {
            id: value.id,
            theme_id: value.theme_id,
            text: value.text,
            option_a: value.option_a,
            option_b: value.option_b,
            option_c: value.option_c,
            correct_answer: value.correct_answer,
            difficulty: value.difficulty,
            round_number: value.round_number,
        }
    }
}

impl From<GameQuestion> for GameQuestionEntity {
    fn from(value: GameQuestion) -> Self {
        Self {
            id: value.id,
            theme_id: value.theme_id,
            text: value.text,
            option_a: value.option_a,
            option_b: value.option_b,
            option_c: value.option_c,
            correct_answer: value.correct_answer,
            difficulty: value.difficulty,
            round_number: value.round_number,
        }
    }
}

impl From<AnswerEntity> for RecordedAnswer {
    fn from(value: AnswerEntity) -> Self {
        Self {
            participant_id: value.participant_id,
            question_id: value.question_id,
            round: value.round,
            answer: value.answer,
            correct: value.correct,
            points: value.points,
            answered_at: value.answered_at,
        }
    }
}

impl From<RecordedAnswer> for AnswerEntity {
    fn from(value: RecordedAnswer) -> Self {
        Self {
            participant_id: value.participant_id,
            question_id: value.question_id,
            round: value.round,
            answer: value.answer,
            correct: value.correct,
            points: value.points,
            answered_at: value.answered_at,
        }
    }
}

impl TryFrom<GameSessionEntity> for GameSession {
    type Error = StorageError;

    fn try_from(value: GameSessionEntity) -> Result<Self, Self::Error> {
        if value.participants.len() != PARTICIPANTS_PER_SESSION {
            return Err(StorageError::Inconsistent(format!(
                "session `{}` has {} participants",
                value.id,
                value.participants.len()
            )));
        }

        let mut participants: Vec<GameParticipant> =
            value.participants.into_iter().map(Into::into).collect();
        participants.sort_by_key(|participant| participant.position);

        Ok(Self {
            id: value.id,
            status: value.status,
            theme_id: value.theme_id,
            current_round: value.current_round,
            total_rounds: value.total_rounds,
            started_at: value.started_at,
            ended_at: value.ended_at,
            participants,
            round_status: value.round_status,
            current_question: value.current_question.map(Into::into),
            round_start_time: value.round_start_time,
            round_end_time: value.round_end_time,
            asked_question_ids: value.asked_question_ids,
            answers: value.answers.into_iter().map(Into::into).collect(),
            winner_id: value.winner_id,
        })
    }
}

impl From<GameSession> for GameSessionEntity {
    fn from(value: GameSession) -> Self {
        Self {
            id: value.id,
            status: value.status,
            theme_id: value.theme_id,
            current_round: value.current_round,
            total_rounds: value.total_rounds,
            started_at: value.started_at,
            ended_at: value.ended_at,
            participants: value.participants.into_iter().map(Into::into).collect(),
            round_status: value.round_status,
            current_question: value.current_question.map(Into::into),
            round_start_time: value.round_start_time,
            round_end_time: value.round_end_time,
            asked_question_ids: value.asked_question_ids,
            answers: value.answers.into_iter().map(Into::into).collect(),
            winner_id: value.winner_id,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dao::models::ParticipantStatus;

    pub(crate) fn participant(name: &str) -> ParticipantEntity {
        ParticipantEntity {
            id: Uuid::new_v4(),
            name: name.into(),
            city: "Recife".into(),
            state: "PE".into(),
            photo_url: None,
            status: ParticipantStatus::Waiting,
            created_at: SystemTime::UNIX_EPOCH,
        }
    }

    pub(crate) fn question(correct: AnswerChoice) -> QuestionEntity {
        QuestionEntity {
            id: Uuid::new_v4(),
            theme_id: None,
            text: "Capital of Brazil?".into(),
            option_a: "Brasília".into(),
            option_b: "Rio de Janeiro".into(),
            option_c: "São Paulo".into(),
            correct_answer: correct,
            difficulty: Difficulty::Easy,
            created_at: SystemTime::UNIX_EPOCH,
        }
    }

    const FLAT: ScoringRules = ScoringRules {
        points_per_correct_answer: 10,
        max_time_bonus: 0,
    };
    const WINDOW: Duration = Duration::from_secs(30);

    fn session() -> (GameSession, SystemTime) {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let session = GameSession::new(
            vec![participant("Ana"), participant("Bruno"), participant("Carla")],
            None,
            3,
            now,
        )
        .unwrap();
        (session, now)
    }

    fn seat(session: &GameSession, position: usize) -> Uuid {
        session.participants[position].participant_id
    }

    #[test]
    fn selection_requires_three_distinct_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        assert_eq!(validate_selection(&[a, b, c]), Ok(()));
        assert_eq!(
            validate_selection(&[a, b]),
            Err(SelectionError::WrongCount(2))
        );
        assert_eq!(
            validate_selection(&[a, b, c, Uuid::new_v4()]),
            Err(SelectionError::WrongCount(4))
        );
        assert_eq!(
            validate_selection(&[a, b, a]),
            Err(SelectionError::Duplicate(a))
        );
    }

    #[test]
    fn new_session_seats_participants_in_input_order() {
        let (session, now) = session();

        assert_eq!(session.participants.len(), PARTICIPANTS_PER_SESSION);
        assert_eq!(
            session
                .participants
                .iter()
                .map(|p| p.position)
                .collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(session.participants.iter().all(|p| p.score == 0));
        assert_eq!(session.participants[0].name, "Ana");
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.current_round, 1);
        assert_eq!(session.round_status, RoundStatus::Waiting);
        assert_eq!(session.started_at, now);
    }

    #[test]
    fn correct_answer_scores_and_wrong_answer_does_not() {
        let (mut session, now) = session();
        let q = GameQuestion::from_bank(question(AnswerChoice::A), 1);
        let qid = q.id;
        session.begin_round(1, q, now, WINDOW);

        let first = seat(&session, 0);
        let second = seat(&session, 1);
        let at = now + Duration::from_secs(5);

        let recorded = session
            .record_answer(first, qid, AnswerChoice::A, at, &FLAT)
            .unwrap();
        assert!(recorded.correct);
        assert_eq!(recorded.points, 10);

        let recorded = session
            .record_answer(second, qid, AnswerChoice::B, at, &FLAT)
            .unwrap();
        assert!(!recorded.correct);
        assert_eq!(recorded.points, 0);

        let scores: Vec<u32> = session.participants.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![10, 0, 0]);
        assert_eq!(session.answered_count(), 2);
        assert!(!session.all_answered());
    }

    #[test]
    fn late_answer_is_rejected_without_scoring() {
        let (mut session, now) = session();
        let q = GameQuestion::from_bank(question(AnswerChoice::C), 1);
        let qid = q.id;
        session.begin_round(1, q, now, WINDOW);

        let late = now + WINDOW + Duration::from_millis(1);
        let err = session
            .record_answer(seat(&session, 2), qid, AnswerChoice::C, late, &FLAT)
            .unwrap_err();
        assert_eq!(err, AnswerError::Rejected(RejectReason::Late));
        assert!(session.participants.iter().all(|p| p.score == 0));
        assert!(session.answers.is_empty());
    }

    #[test]
    fn answer_on_the_deadline_is_accepted() {
        let (mut session, now) = session();
        let q = GameQuestion::from_bank(question(AnswerChoice::C), 1);
        let qid = q.id;
        session.begin_round(1, q, now, WINDOW);

        assert!(
            session
                .record_answer(seat(&session, 0), qid, AnswerChoice::C, now + WINDOW, &FLAT)
                .is_ok()
        );
    }

    #[test]
    fn duplicate_is_rejected_with_the_same_reason_every_time() {
        let (mut session, now) = session();
        let q = GameQuestion::from_bank(question(AnswerChoice::A), 1);
        let qid = q.id;
        session.begin_round(1, q, now, WINDOW);
        let first = seat(&session, 0);

        session
            .record_answer(first, qid, AnswerChoice::A, now, &FLAT)
            .unwrap();
        for _ in 0..2 {
            let err = session
                .record_answer(first, qid, AnswerChoice::B, now, &FLAT)
                .unwrap_err();
            assert_eq!(err, AnswerError::Rejected(RejectReason::Duplicate));
        }

        session.finish_round(now + Duration::from_secs(1));
        let err = session
            .record_answer(first, qid, AnswerChoice::A, now + WINDOW * 2, &FLAT)
            .unwrap_err();
        assert_eq!(err, AnswerError::Rejected(RejectReason::Duplicate));
        assert_eq!(session.participants[0].score, 10);
    }

    #[test]
    fn answer_for_other_question_is_rejected() {
        let (mut session, now) = session();
        let first = seat(&session, 0);

        let err = session
            .record_answer(first, Uuid::new_v4(), AnswerChoice::A, now, &FLAT)
            .unwrap_err();
        assert_eq!(err, AnswerError::Rejected(RejectReason::WrongQuestion));

        session.begin_round(1, GameQuestion::from_bank(question(AnswerChoice::A), 1), now, WINDOW);
        let err = session
            .record_answer(first, Uuid::new_v4(), AnswerChoice::A, now, &FLAT)
            .unwrap_err();
        assert_eq!(err, AnswerError::Rejected(RejectReason::WrongQuestion));
    }

    #[test]
    fn unseated_participant_is_refused() {
        let (mut session, now) = session();
        let q = GameQuestion::from_bank(question(AnswerChoice::A), 1);
        let qid = q.id;
        session.begin_round(1, q, now, WINDOW);
        let stranger = Uuid::new_v4();

        assert_eq!(
            session
                .record_answer(stranger, qid, AnswerChoice::A, now, &FLAT)
                .unwrap_err(),
            AnswerError::NotSeated(stranger)
        );
    }

    #[test]
    fn answer_after_round_finished_is_late() {
        let (mut session, now) = session();
        let q = GameQuestion::from_bank(question(AnswerChoice::A), 1);
        let qid = q.id;
        session.begin_round(1, q, now, WINDOW);
        session.finish_round(now + Duration::from_secs(2));

        let err = session
            .record_answer(seat(&session, 1), qid, AnswerChoice::A, now + Duration::from_secs(3), &FLAT)
            .unwrap_err();
        assert_eq!(err, AnswerError::Rejected(RejectReason::Late));
        assert_eq!(session.round_end_time, Some(now + Duration::from_secs(2)));
    }

    #[test]
    fn all_answered_once_every_seat_answered() {
        let (mut session, now) = session();
        let q = GameQuestion::from_bank(question(AnswerChoice::B), 1);
        let qid = q.id;
        session.begin_round(1, q, now, WINDOW);

        for position in 0..PARTICIPANTS_PER_SESSION {
            let id = seat(&session, position);
            session
                .record_answer(id, qid, AnswerChoice::B, now, &FLAT)
                .unwrap();
        }
        assert!(session.all_answered());
    }

    #[test]
    fn time_bonus_scales_with_remaining_window() {
        let rules = ScoringRules {
            points_per_correct_answer: 10,
            max_time_bonus: 20,
        };
        assert_eq!(rules.award(WINDOW, WINDOW), 30);
        assert_eq!(rules.award(WINDOW / 2, WINDOW), 20);
        assert_eq!(rules.award(Duration::ZERO, WINDOW), 10);
        assert_eq!(FLAT.award(WINDOW, WINDOW), 10);
    }

    #[test]
    fn winner_is_highest_score() {
        let (mut session, now) = session();
        session.participants[1].score = 30;
        session.participants[2].score = 20;

        assert_eq!(session.finish(now), Some(seat(&session, 1)));
        assert_eq!(session.status, SessionStatus::Finished);
        assert_eq!(session.ended_at, Some(now));
        assert!(session.participants.iter().all(|p| p.left_at == Some(now)));
    }

    #[test]
    fn tie_goes_to_lowest_position() {
        let (mut session, now) = session();
        session.participants[1].score = 20;
        session.participants[2].score = 20;
        assert_eq!(session.finish(now), Some(seat(&session, 1)));

        let (mut scoreless, now) = self::session();
        assert_eq!(scoreless.finish(now), Some(seat(&scoreless, 0)));
    }

    #[test]
    fn finishing_mid_round_closes_the_round() {
        let (mut session, now) = session();
        session.begin_round(1, GameQuestion::from_bank(question(AnswerChoice::A), 1), now, WINDOW);
        session.finish(now + Duration::from_secs(1));
        assert_eq!(session.round_status, RoundStatus::Finished);
        assert_eq!(session.time_remaining(now), Duration::ZERO);
    }

    #[test]
    fn entity_round_trip_preserves_answers_and_positions() {
        let (mut session, now) = session();
        let q = GameQuestion::from_bank(question(AnswerChoice::A), 1);
        let qid = q.id;
        session.begin_round(1, q, now, WINDOW);
        session
            .record_answer(seat(&session, 0), qid, AnswerChoice::A, now, &FLAT)
            .unwrap();

        let entity: GameSessionEntity = session.clone().into();
        let restored = GameSession::try_from(entity).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn entity_with_wrong_arity_is_inconsistent() {
        let (session, _) = session();
        let mut entity: GameSessionEntity = session.into();
        entity.participants.pop();
        assert!(matches!(
            GameSession::try_from(entity),
            Err(StorageError::Inconsistent(_))
        ));
    }
}
