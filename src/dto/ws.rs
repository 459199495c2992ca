use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::AnswerChoice,
    dto::game::{AnswerReceipt, SessionSnapshot},
    state::game::RejectReason,
};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type")]
pub enum PlayerInboundMessage {
    #[serde(rename = "identification")]
    Identification { participant_id: Uuid },
    #[serde(rename = "answer")]
    Answer {
        question_id: Uuid,
        answer: AnswerChoice,
    },
    #[serde(rename = "request_state")]
    RequestState {
        #[serde(default)]
        session_id: Option<Uuid>,
    },
    #[serde(other)]
    Unknown,
}

impl PlayerInboundMessage {
    pub fn identification_id(&self) -> Option<Uuid> {
        match self {
            Self::Identification { participant_id } => Some(*participant_id),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Frames pushed privately to a single player.
#[serde(tag = "type")]
pub enum PlayerOutboundMessage {
    /// Positive acknowledgement after a successful identification.
    #[serde(rename = "identified")]
    Identified { participant_id: Uuid },
    #[serde(rename = "answer:accepted")]
    AnswerAccepted { receipt: AnswerReceipt },
    /// Only the submitting player learns why an answer was refused.
    #[serde(rename = "answer:rejected")]
    AnswerRejected {
        question_id: Uuid,
        reason: RejectReason,
    },
    #[serde(rename = "state")]
    State { snapshot: SessionSnapshot },
    #[serde(rename = "error")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_frames_do_not_fail_parsing() {
        let message: PlayerInboundMessage =
            serde_json::from_str(r#"{ "type": "ping", "id": "x" }"#).unwrap();
        assert!(matches!(message, PlayerInboundMessage::Unknown));
    }

    #[test]
    fn answer_frame_parses_choice() {
        let question_id = Uuid::new_v4();
        let raw = format!(r#"{{ "type": "answer", "question_id": "{question_id}", "answer": "C" }}"#);
        let message: PlayerInboundMessage = serde_json::from_str(&raw).unwrap();
        match message {
            PlayerInboundMessage::Answer {
                question_id: parsed,
                answer,
            } => {
                assert_eq!(parsed, question_id);
                assert_eq!(answer, AnswerChoice::C);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn rejection_frame_carries_reason() {
        let frame = PlayerOutboundMessage::AnswerRejected {
            question_id: Uuid::nil(),
            reason: RejectReason::Late,
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "answer:rejected");
        assert_eq!(value["reason"], "late");
    }
}
