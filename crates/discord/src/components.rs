use loa_core::domain::submission::{
    LoaStatus, LoaSubmission, IC_NAME_FIELD, PENDING_COLOR, REASON_FIELD, RETURN_DATE_FIELD,
    START_DATE_FIELD,
};
use serde::{Deserialize, Serialize, Serializer};

pub const POST_LOA_COMMAND: &str = "postloa";
pub const SELECT_LOA: &str = "selectLOA";
pub const SUBMIT_LOA_OPTION: &str = "submitLOA";
pub const LOA_MODAL_PREFIX: &str = "loaModal_";
pub const APPROVE_LOA_BUTTON: &str = "approveLOA";
pub const DENY_LOA_BUTTON: &str = "denyLOA";
pub const MORE_INFO_LOA_BUTTON: &str = "moreinfoLOA";

/// Message flag marking a reply as visible to the invoking user only.
pub const EPHEMERAL_FLAG: u64 = 1 << 6;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Embed {
    pub fn with_title(&self, title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..self.clone() }
    }

    pub fn with_color(&self, color: u32) -> Self {
        Self { color: Some(color), ..self.clone() }
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|field| field.name == name).map(|field| field.value.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inline: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

pub struct EmbedBuilder {
    embed: Embed,
}

impl EmbedBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self { embed: Embed { title: Some(title.into()), ..Embed::default() } }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.embed.description = Some(text.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.embed.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.embed.fields.push(EmbedField { name: name.into(), value: value.into(), inline: false });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.embed.footer = Some(EmbedFooter { text: text.into(), icon_url: None });
        self
    }

    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.embed.timestamp = Some(timestamp.into());
        self
    }

    pub fn build(self) -> Embed {
        self.embed
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentType {
    ActionRow = 1,
    Button = 2,
    StringSelect = 3,
    TextInput = 4,
}

impl Serialize for ComponentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary = 1,
    Secondary = 2,
    Success = 3,
    Danger = 4,
}

impl Serialize for ButtonStyle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextInputStyle {
    Short = 1,
    Paragraph = 2,
}

impl Serialize for TextInputStyle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub components: Vec<Component>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Component {
    Button(Button),
    StringSelect(StringSelect),
    TextInput(TextInput),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

impl Button {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            kind: ComponentType::Button,
            custom_id: custom_id.into(),
            label: label.into(),
            style,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StringSelect {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub custom_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub options: Vec<SelectOption>,
}

impl StringSelect {
    pub fn new(custom_id: impl Into<String>) -> Self {
        Self {
            kind: ComponentType::StringSelect,
            custom_id: custom_id.into(),
            placeholder: None,
            options: Vec::new(),
        }
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn option(
        mut self,
        label: impl Into<String>,
        value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.options.push(SelectOption {
            label: label.into(),
            value: value.into(),
            description: Some(description.into()),
        });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TextInput {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub custom_id: String,
    pub label: String,
    pub style: TextInputStyle,
    pub required: bool,
}

impl TextInput {
    pub fn new(
        custom_id: impl Into<String>,
        label: impl Into<String>,
        style: TextInputStyle,
    ) -> Self {
        Self {
            kind: ComponentType::TextInput,
            custom_id: custom_id.into(),
            label: label.into(),
            style,
            required: true,
        }
    }
}

/// Body of a channel message create or edit. `components` is always sent so an
/// edit with no rows strips the existing ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
    pub components: Vec<ActionRow>,
}

#[derive(Default)]
pub struct MessageBuilder {
    embeds: Vec<Embed>,
    components: Vec<ActionRow>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn action_row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ActionRowBuilder),
    {
        let mut builder = ActionRowBuilder::default();
        build(&mut builder);
        self.components.push(builder.build());
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { content: None, embeds: self.embeds, components: self.components }
    }
}

#[derive(Default)]
pub struct ActionRowBuilder {
    components: Vec<Component>,
}

impl ActionRowBuilder {
    pub fn button(&mut self, button: Button) -> &mut Self {
        self.components.push(Component::Button(button));
        self
    }

    pub fn select(&mut self, select: StringSelect) -> &mut Self {
        self.components.push(Component::StringSelect(select));
        self
    }

    pub fn text_input(&mut self, input: TextInput) -> &mut Self {
        self.components.push(Component::TextInput(input));
        self
    }

    fn build(self) -> ActionRow {
        ActionRow { kind: ComponentType::ActionRow, components: self.components }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalTemplate {
    pub custom_id: String,
    pub title: String,
    pub components: Vec<ActionRow>,
}

impl ModalTemplate {
    pub fn new(custom_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self { custom_id: custom_id.into(), title: title.into(), components: Vec::new() }
    }

    /// Modals take one text input per action row.
    pub fn input(mut self, input: TextInput) -> Self {
        let mut row = ActionRowBuilder::default();
        row.text_input(input);
        self.components.push(row.build());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionResponse {
    Ephemeral(String),
    Modal(ModalTemplate),
}

impl InteractionResponse {
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self::Ephemeral(content.into())
    }

    pub fn to_callback(&self) -> InteractionCallback {
        match self {
            Self::Ephemeral(content) => InteractionCallback {
                kind: CHANNEL_MESSAGE_WITH_SOURCE,
                data: CallbackData::Message { content: content.clone(), flags: EPHEMERAL_FLAG },
            },
            Self::Modal(modal) => {
                InteractionCallback { kind: MODAL, data: CallbackData::Modal(modal.clone()) }
            }
        }
    }
}

const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;
const MODAL: u8 = 9;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InteractionCallback {
    #[serde(rename = "type")]
    pub kind: u8,
    pub data: CallbackData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CallbackData {
    Message { content: String, flags: u64 },
    Modal(ModalTemplate),
}

pub fn loa_form_message() -> MessageTemplate {
    MessageBuilder::new()
        .embed(
            EmbedBuilder::new("📝 Leave of Absence (LOA)")
                .color(PENDING_COLOR)
                .description(
                    "Click the dropdown below to submit a Leave of Absence. Fill in your Name (IC) , start and return dates, and reason.",
                )
                .footer("LOA forms will be reviewed by Command")
                .build(),
        )
        .action_row(|row| {
            row.select(StringSelect::new(SELECT_LOA).placeholder("Submit LOA...").option(
                "Submit LOA",
                SUBMIT_LOA_OPTION,
                "Fill out a leave of absence form.",
            ));
        })
        .build()
}

pub fn loa_modal_id(user_id: &str) -> String {
    format!("{LOA_MODAL_PREFIX}{user_id}")
}

pub fn loa_modal(user_id: &str) -> ModalTemplate {
    ModalTemplate::new(loa_modal_id(user_id), "Submit Leave of Absence")
        .input(TextInput::new(IC_NAME_FIELD, "IC Name", TextInputStyle::Short))
        .input(TextInput::new(START_DATE_FIELD, "Start Date (DD-MM-YYYY)", TextInputStyle::Short))
        .input(TextInput::new(
            RETURN_DATE_FIELD,
            "Return Date (DD-MM-YYYY)",
            TextInputStyle::Short,
        ))
        .input(TextInput::new(REASON_FIELD, "Reason for LOA", TextInputStyle::Paragraph))
}

pub fn submission_embed(submission: &LoaSubmission) -> Embed {
    EmbedBuilder::new(submission.status.title())
        .color(submission.status.color())
        .description(format!("**Applicant:** {}", submission.applicant_id.mention()))
        .field("IC Name", submission.form.ic_name.clone())
        .field("Start Date", submission.form.start_date.clone())
        .field("Return Date", submission.form.return_date.clone())
        .field("Reason", submission.form.reason.clone())
        .footer("Staff can approve or deny using the buttons below.")
        .timestamp(submission.submitted_at.to_rfc3339())
        .build()
}

/// Submission embed plus the staff action buttons, as posted to the review channel.
pub fn review_message(embed: Embed) -> MessageTemplate {
    MessageBuilder::new()
        .embed(embed)
        .action_row(|row| {
            row.button(Button::new(APPROVE_LOA_BUTTON, "Approve", ButtonStyle::Success))
                .button(Button::new(DENY_LOA_BUTTON, "Deny", ButtonStyle::Danger))
                .button(Button::new(
                    MORE_INFO_LOA_BUTTON,
                    "Request More Info",
                    ButtonStyle::Secondary,
                ));
        })
        .build()
}

/// Embed only; used for log mirrors and for edits that strip the buttons.
pub fn embed_only_message(embed: Embed) -> MessageTemplate {
    MessageBuilder::new().embed(embed).build()
}

pub fn resolve_embed(embed: &Embed, status: LoaStatus) -> Embed {
    embed.with_title(status.title()).with_color(status.color())
}
