//! Decoding of raw `INTERACTION_CREATE` payloads into [`InteractionEnvelope`]s.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::components::Embed;
use crate::events::{Actor, InteractionEnvelope, InteractionEvent, SourceMessage};

const APPLICATION_COMMAND: u8 = 2;
const MESSAGE_COMPONENT: u8 = 3;
const MODAL_SUBMIT: u8 = 5;

const BUTTON_COMPONENT: u8 = 2;
const STRING_SELECT_COMPONENT: u8 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("interaction payload is malformed: {0}")]
    Malformed(String),
    #[error("interaction payload has no invoking user")]
    MissingUser,
    #[error("interaction payload is missing `{0}`")]
    MissingField(&'static str),
}

#[derive(Deserialize)]
struct RawInteraction {
    id: String,
    token: String,
    #[serde(rename = "type")]
    kind: u8,
    guild_id: Option<String>,
    channel_id: Option<String>,
    member: Option<RawMember>,
    user: Option<RawUser>,
    data: Option<RawData>,
    message: Option<RawMessage>,
}

#[derive(Deserialize)]
struct RawMember {
    user: Option<RawUser>,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
}

#[derive(Deserialize, Default)]
struct RawData {
    name: Option<String>,
    custom_id: Option<String>,
    component_type: Option<u8>,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    components: Vec<RawRow>,
}

#[derive(Deserialize)]
struct RawRow {
    #[serde(default)]
    components: Vec<RawInput>,
    // Label-wrapped modal inputs carry a single `component` instead of a list.
    component: Option<RawInput>,
}

#[derive(Deserialize)]
struct RawInput {
    custom_id: Option<String>,
    value: Option<String>,
}

#[derive(Deserialize)]
struct RawMessage {
    id: String,
    channel_id: Option<String>,
    #[serde(default)]
    embeds: Vec<Embed>,
}

pub fn decode_interaction(payload: Value) -> Result<InteractionEnvelope, PayloadError> {
    let raw: RawInteraction = serde_json::from_value(payload)
        .map_err(|error| PayloadError::Malformed(error.to_string()))?;

    let (user_id, roles) = match (raw.member, raw.user) {
        (Some(member), _) => {
            let user = member.user.ok_or(PayloadError::MissingUser)?;
            (user.id, member.roles)
        }
        (None, Some(user)) => (user.id, Vec::new()),
        (None, None) => return Err(PayloadError::MissingUser),
    };

    let data = raw.data.unwrap_or_default();
    let event = match raw.kind {
        APPLICATION_COMMAND => InteractionEvent::Command {
            name: data.name.ok_or(PayloadError::MissingField("data.name"))?,
        },
        MESSAGE_COMPONENT => {
            let custom_id = data.custom_id.ok_or(PayloadError::MissingField("data.custom_id"))?;
            match data.component_type {
                Some(BUTTON_COMPONENT) => {
                    let message = raw.message.ok_or(PayloadError::MissingField("message"))?;
                    let channel_id = message
                        .channel_id
                        .or_else(|| raw.channel_id.clone())
                        .ok_or(PayloadError::MissingField("message.channel_id"))?;
                    InteractionEvent::Button {
                        custom_id,
                        message: SourceMessage {
                            id: message.id,
                            channel_id,
                            embeds: message.embeds,
                        },
                    }
                }
                Some(STRING_SELECT_COMPONENT) => {
                    InteractionEvent::SelectMenu { custom_id, values: data.values }
                }
                _ => InteractionEvent::Unsupported { interaction_type: raw.kind },
            }
        }
        MODAL_SUBMIT => InteractionEvent::ModalSubmit {
            custom_id: data.custom_id.ok_or(PayloadError::MissingField("data.custom_id"))?,
            fields: modal_fields(data.components),
        },
        other => InteractionEvent::Unsupported { interaction_type: other },
    };

    Ok(InteractionEnvelope {
        interaction_id: raw.id,
        token: raw.token,
        guild_id: raw.guild_id,
        channel_id: raw.channel_id,
        actor: Actor { user_id, roles },
        event,
    })
}

fn modal_fields(rows: Vec<RawRow>) -> BTreeMap<String, String> {
    rows.into_iter()
        .flat_map(|row| row.components.into_iter().chain(row.component))
        .filter_map(|input| Some((input.custom_id?, input.value?)))
        .collect()
}
