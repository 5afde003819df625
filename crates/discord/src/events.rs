use std::{collections::BTreeMap, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use loa_core::{ApplicationError, ErrorDisposition, ReviewDecision};
use thiserror::Error;

use crate::{
    api::{ApiError, InteractionRef},
    components::{
        Embed, APPROVE_LOA_BUTTON, DENY_LOA_BUTTON, LOA_MODAL_PREFIX, MORE_INFO_LOA_BUTTON,
        POST_LOA_COMMAND, SELECT_LOA, SUBMIT_LOA_OPTION,
    },
    workflow::WorkflowOutcome,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionEnvelope {
    pub interaction_id: String,
    pub token: String,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub actor: Actor,
    pub event: InteractionEvent,
}

impl InteractionEnvelope {
    pub fn interaction_ref(&self) -> InteractionRef {
        InteractionRef { id: self.interaction_id.clone(), token: self.token.clone() }
    }
}

/// The invoking member. `roles` is empty outside a guild.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub roles: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionEvent {
    Command { name: String },
    SelectMenu { custom_id: String, values: Vec<String> },
    Button { custom_id: String, message: SourceMessage },
    ModalSubmit { custom_id: String, fields: BTreeMap<String, String> },
    Unsupported { interaction_type: u8 },
}

impl InteractionEvent {
    pub fn kind(&self) -> InteractionKind {
        match self {
            Self::Command { .. } => InteractionKind::Command,
            Self::SelectMenu { .. } => InteractionKind::SelectMenu,
            Self::Button { .. } => InteractionKind::Button,
            Self::ModalSubmit { .. } => InteractionKind::ModalSubmit,
            Self::Unsupported { .. } => InteractionKind::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Command,
    SelectMenu,
    Button,
    ModalSubmit,
    Unsupported,
}

/// The message a component was attached to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceMessage {
    pub id: String,
    pub channel_id: String,
    pub embeds: Vec<Embed>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Handled(WorkflowOutcome),
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Application(#[from] ApplicationError),
}

impl EventHandlerError {
    pub fn disposition(&self) -> ErrorDisposition {
        match self {
            Self::Api(_) => ErrorDisposition::Logged,
            Self::Application(error) => error.disposition(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

impl DispatchError {
    pub fn disposition(&self) -> ErrorDisposition {
        match self {
            Self::Handler(error) => error.disposition(),
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn kind(&self) -> InteractionKind;
    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<InteractionKind, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.kind(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.kind()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// The four steps of the LOA flow, one per interaction the bot answers.
#[async_trait]
pub trait LoaService: Send + Sync {
    async fn post_form(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<WorkflowOutcome, EventHandlerError>;

    async fn open_form(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<WorkflowOutcome, EventHandlerError>;

    async fn submit_form(
        &self,
        envelope: &InteractionEnvelope,
        fields: &BTreeMap<String, String>,
        ctx: &EventContext,
    ) -> Result<WorkflowOutcome, EventHandlerError>;

    async fn review(
        &self,
        envelope: &InteractionEnvelope,
        message: &SourceMessage,
        decision: ReviewDecision,
        ctx: &EventContext,
    ) -> Result<WorkflowOutcome, EventHandlerError>;
}

/// Registers one handler per interaction kind, all backed by the same service.
pub fn loa_dispatcher<S>(service: Arc<S>) -> EventDispatcher
where
    S: LoaService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandHandler::new(service.clone()));
    dispatcher.register(SelectMenuHandler::new(service.clone()));
    dispatcher.register(ModalSubmitHandler::new(service.clone()));
    dispatcher.register(ButtonHandler::new(service));
    dispatcher
}

pub struct CommandHandler<S> {
    service: Arc<S>,
}

impl<S> CommandHandler<S>
where
    S: LoaService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for CommandHandler<S>
where
    S: LoaService + 'static,
{
    fn kind(&self) -> InteractionKind {
        InteractionKind::Command
    }

    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InteractionEvent::Command { name } = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if name != POST_LOA_COMMAND {
            return Ok(HandlerResult::Ignored);
        }

        self.service.post_form(envelope, ctx).await.map(HandlerResult::Handled)
    }
}

pub struct SelectMenuHandler<S> {
    service: Arc<S>,
}

impl<S> SelectMenuHandler<S>
where
    S: LoaService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for SelectMenuHandler<S>
where
    S: LoaService + 'static,
{
    fn kind(&self) -> InteractionKind {
        InteractionKind::SelectMenu
    }

    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InteractionEvent::SelectMenu { custom_id, values } = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if custom_id != SELECT_LOA || values.first().map(String::as_str) != Some(SUBMIT_LOA_OPTION)
        {
            return Ok(HandlerResult::Ignored);
        }

        self.service.open_form(envelope, ctx).await.map(HandlerResult::Handled)
    }
}

pub struct ModalSubmitHandler<S> {
    service: Arc<S>,
}

impl<S> ModalSubmitHandler<S>
where
    S: LoaService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ModalSubmitHandler<S>
where
    S: LoaService + 'static,
{
    fn kind(&self) -> InteractionKind {
        InteractionKind::ModalSubmit
    }

    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InteractionEvent::ModalSubmit { custom_id, fields } = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if !custom_id.starts_with(LOA_MODAL_PREFIX) {
            return Ok(HandlerResult::Ignored);
        }

        self.service.submit_form(envelope, fields, ctx).await.map(HandlerResult::Handled)
    }
}

pub struct ButtonHandler<S> {
    service: Arc<S>,
}

impl<S> ButtonHandler<S>
where
    S: LoaService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ButtonHandler<S>
where
    S: LoaService + 'static,
{
    fn kind(&self) -> InteractionKind {
        InteractionKind::Button
    }

    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InteractionEvent::Button { custom_id, message } = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(decision) = review_decision(custom_id) else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.review(envelope, message, decision, ctx).await.map(HandlerResult::Handled)
    }
}

fn review_decision(custom_id: &str) -> Option<ReviewDecision> {
    match custom_id {
        APPROVE_LOA_BUTTON => Some(ReviewDecision::Approve),
        DENY_LOA_BUTTON => Some(ReviewDecision::Deny),
        MORE_INFO_LOA_BUTTON => Some(ReviewDecision::RequestMoreInfo),
        _ => None,
    }
}
