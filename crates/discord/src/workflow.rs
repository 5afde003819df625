use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use loa_core::config::LoaConfig;
use loa_core::{
    ApplicationError, DomainError, LoaForm, LoaStatus, LoaSubmission, Permission,
    ReviewDecision, RolePolicy, UserId,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::DiscordApi;
use crate::channels::ChannelResolver;
use crate::components::{
    embed_only_message, loa_form_message, loa_modal, resolve_embed, review_message,
    submission_embed, Embed, InteractionResponse,
};
use crate::events::{
    EventContext, EventHandlerError, InteractionEnvelope, LoaService, SourceMessage,
};

pub const NO_POST_PERMISSION_REPLY: &str = "❌ You do not have permission to post LOA messages.";
pub const CREATING_FORM_REPLY: &str = "✅ Creating LOA message...";
pub const REVIEW_CHANNEL_MISSING_REPLY: &str = "❌ LOA review channel not found.";
pub const SUBMITTED_REPLY: &str = "✅ Your LOA has been submitted!";
pub const NO_REVIEW_PERMISSION_REPLY: &str = "❌ You do not have permission.";
pub const APPROVED_REPLY: &str = "LOA approved!";
pub const DENIED_REPLY: &str = "LOA denied.";
pub const MORE_INFO_REPLY: &str = "Request sent to applicant for more information.";
pub const ALREADY_RESOLVED_REPLY: &str = "⚠️ This LOA has already been resolved.";

const DEFAULT_LEDGER_CAPACITY: usize = 4_096;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowOutcome {
    FormPosted { message_id: String },
    PermissionDenied { permission: Permission },
    ModalOpened,
    Submitted { review_message_id: String },
    ReviewChannelMissing,
    Resolved { message_id: String, status: LoaStatus },
    MoreInfoRequested,
    AlreadyResolved { message_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowSettings {
    pub review_channel: String,
    pub log_channel: String,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self { review_channel: "loa-review".to_owned(), log_channel: "loa-logs".to_owned() }
    }
}

impl From<&LoaConfig> for WorkflowSettings {
    fn from(config: &LoaConfig) -> Self {
        Self {
            review_channel: config.review_channel.clone(),
            log_channel: config.log_channel.clone(),
        }
    }
}

/// Message ids this process has already resolved, oldest evicted first.
#[derive(Debug)]
pub struct ResolutionLedger {
    capacity: usize,
    resolved: HashSet<String>,
    order: VecDeque<String>,
}

impl Default for ResolutionLedger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LEDGER_CAPACITY)
    }
}

impl ResolutionLedger {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), resolved: HashSet::new(), order: VecDeque::new() }
    }

    /// Returns false when the message was already claimed.
    pub fn claim(&mut self, message_id: &str) -> bool {
        if !self.resolved.insert(message_id.to_owned()) {
            return false;
        }

        self.order.push_back(message_id.to_owned());
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.resolved.remove(&evicted);
            }
        }
        true
    }

    pub fn release(&mut self, message_id: &str) {
        if self.resolved.remove(message_id) {
            self.order.retain(|id| id != message_id);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

pub struct LoaWorkflow {
    api: Arc<dyn DiscordApi>,
    channels: Arc<dyn ChannelResolver>,
    policy: RolePolicy,
    settings: WorkflowSettings,
    ledger: Mutex<ResolutionLedger>,
}

impl LoaWorkflow {
    pub fn new(
        api: Arc<dyn DiscordApi>,
        channels: Arc<dyn ChannelResolver>,
        policy: RolePolicy,
        settings: WorkflowSettings,
    ) -> Self {
        Self { api, channels, policy, settings, ledger: Mutex::new(ResolutionLedger::default()) }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Ephemeral replies are best effort; a failed callback is logged and the flow continues.
    async fn reply(&self, envelope: &InteractionEnvelope, ctx: &EventContext, content: &str) {
        let response = InteractionResponse::ephemeral(content);
        if let Err(error) = self.api.respond(&envelope.interaction_ref(), &response).await {
            warn!(
                event_name = "loa.reply.failed",
                correlation_id = %ctx.correlation_id,
                user_id = %envelope.actor.user_id,
                error = %error,
                "failed to send ephemeral reply"
            );
        }
    }

    fn authorize(&self, envelope: &InteractionEnvelope, permission: Permission) -> bool {
        self.policy.check(&envelope.actor.roles, permission).is_allowed()
    }

    async fn log_channel(&self, guild_id: Option<&str>, ctx: &EventContext) -> Option<String> {
        let guild_id = guild_id?;
        let name = &self.settings.log_channel;

        match self.channels.resolve(guild_id, name).await {
            Ok(Some(channel_id)) => Some(channel_id),
            Ok(None) => {
                let missing = ApplicationError::MissingOptionalChannel(name.clone());
                debug!(
                    correlation_id = %ctx.correlation_id,
                    guild_id,
                    error_class = missing.error_class(),
                    "log channel not found; skipping mirror"
                );
                None
            }
            Err(error) => {
                warn!(
                    correlation_id = %ctx.correlation_id,
                    guild_id,
                    error = %error,
                    "log channel lookup failed; skipping mirror"
                );
                None
            }
        }
    }

    async fn mirror(&self, channel_id: Option<String>, embed: Embed, ctx: &EventContext) {
        let Some(channel_id) = channel_id else {
            return;
        };

        if let Err(error) = self.api.send_message(&channel_id, &embed_only_message(embed)).await {
            warn!(
                event_name = "loa.log.mirror_failed",
                correlation_id = %ctx.correlation_id,
                channel_id = %channel_id,
                error = %error,
                "failed to mirror LOA to log channel"
            );
        }
    }
}

#[async_trait]
impl LoaService for LoaWorkflow {
    async fn post_form(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<WorkflowOutcome, EventHandlerError> {
        if !self.authorize(envelope, Permission::PostForm) {
            info!(
                event_name = "loa.form.denied",
                correlation_id = %ctx.correlation_id,
                user_id = %envelope.actor.user_id,
                "postloa rejected for actor without a permitted role"
            );
            self.reply(envelope, ctx, NO_POST_PERMISSION_REPLY).await;
            return Ok(WorkflowOutcome::PermissionDenied { permission: Permission::PostForm });
        }

        self.reply(envelope, ctx, CREATING_FORM_REPLY).await;

        let channel_id = envelope.channel_id.as_deref().ok_or_else(|| {
            ApplicationError::Integration("postloa interaction carried no channel".to_owned())
        })?;
        let sent = self.api.send_message(channel_id, &loa_form_message()).await?;

        info!(
            event_name = "loa.form.posted",
            correlation_id = %ctx.correlation_id,
            user_id = %envelope.actor.user_id,
            channel_id = %sent.channel_id,
            message_id = %sent.id,
            "posted LOA form"
        );
        Ok(WorkflowOutcome::FormPosted { message_id: sent.id })
    }

    async fn open_form(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<WorkflowOutcome, EventHandlerError> {
        let modal = InteractionResponse::Modal(loa_modal(&envelope.actor.user_id));
        self.api.respond(&envelope.interaction_ref(), &modal).await?;

        debug!(
            event_name = "loa.form.modal_opened",
            correlation_id = %ctx.correlation_id,
            user_id = %envelope.actor.user_id,
            "opened LOA modal"
        );
        Ok(WorkflowOutcome::ModalOpened)
    }

    async fn submit_form(
        &self,
        envelope: &InteractionEnvelope,
        fields: &BTreeMap<String, String>,
        ctx: &EventContext,
    ) -> Result<WorkflowOutcome, EventHandlerError> {
        let form = LoaForm::from_fields(fields).map_err(ApplicationError::from)?;

        let review_channel = match envelope.guild_id.as_deref() {
            Some(guild_id) => self.channels.resolve(guild_id, &self.settings.review_channel).await?,
            None => None,
        };
        let Some(review_channel) = review_channel else {
            let missing = ApplicationError::MissingChannel(self.settings.review_channel.clone());
            warn!(
                event_name = "loa.submission.review_channel_missing",
                correlation_id = %ctx.correlation_id,
                guild_id = envelope.guild_id.as_deref().unwrap_or("unknown"),
                error = %missing,
                "cannot forward LOA submission"
            );
            self.reply(envelope, ctx, REVIEW_CHANNEL_MISSING_REPLY).await;
            return Ok(WorkflowOutcome::ReviewChannelMissing);
        };

        let submission =
            LoaSubmission::new(UserId(envelope.actor.user_id.clone()), form, Utc::now());
        let embed = submission_embed(&submission);
        let sent = self.api.send_message(&review_channel, &review_message(embed.clone())).await?;

        info!(
            event_name = "loa.submission.forwarded",
            correlation_id = %ctx.correlation_id,
            user_id = %envelope.actor.user_id,
            review_channel_id = %review_channel,
            message_id = %sent.id,
            "forwarded LOA submission for review"
        );

        self.reply(envelope, ctx, SUBMITTED_REPLY).await;

        // Only the review post may precede the reply.
        let log_channel = self.log_channel(envelope.guild_id.as_deref(), ctx).await;
        self.mirror(log_channel, embed, ctx).await;

        Ok(WorkflowOutcome::Submitted { review_message_id: sent.id })
    }

    async fn review(
        &self,
        envelope: &InteractionEnvelope,
        message: &SourceMessage,
        decision: ReviewDecision,
        ctx: &EventContext,
    ) -> Result<WorkflowOutcome, EventHandlerError> {
        if !self.authorize(envelope, Permission::ReviewSubmission) {
            info!(
                event_name = "loa.review.denied",
                correlation_id = %ctx.correlation_id,
                user_id = %envelope.actor.user_id,
                message_id = %message.id,
                "review rejected for actor without a permitted role"
            );
            self.reply(envelope, ctx, NO_REVIEW_PERMISSION_REPLY).await;
            return Ok(WorkflowOutcome::PermissionDenied {
                permission: Permission::ReviewSubmission,
            });
        }

        if decision == ReviewDecision::RequestMoreInfo {
            info!(
                event_name = "loa.review.more_info_requested",
                correlation_id = %ctx.correlation_id,
                user_id = %envelope.actor.user_id,
                message_id = %message.id,
                "more information requested"
            );
            self.reply(envelope, ctx, MORE_INFO_REPLY).await;
            return Ok(WorkflowOutcome::MoreInfoRequested);
        }

        let embed = message.embeds.first().ok_or_else(|| {
            ApplicationError::from(DomainError::InvariantViolation(format!(
                "review message `{}` carries no embed",
                message.id
            )))
        })?;

        let current =
            embed.title.as_deref().and_then(LoaStatus::from_title).unwrap_or(LoaStatus::Pending);
        let next = match current.apply(decision) {
            Ok(next) => next,
            Err(error) => {
                debug!(
                    correlation_id = %ctx.correlation_id,
                    message_id = %message.id,
                    error = %error,
                    "ignoring click on resolved LOA"
                );
                self.reply(envelope, ctx, ALREADY_RESOLVED_REPLY).await;
                return Ok(WorkflowOutcome::AlreadyResolved { message_id: message.id.clone() });
            }
        };

        if !self.ledger.lock().await.claim(&message.id) {
            self.reply(envelope, ctx, ALREADY_RESOLVED_REPLY).await;
            return Ok(WorkflowOutcome::AlreadyResolved { message_id: message.id.clone() });
        }

        let updated = resolve_embed(embed, next);
        if let Err(error) = self
            .api
            .edit_message(&message.channel_id, &message.id, &embed_only_message(updated.clone()))
            .await
        {
            self.ledger.lock().await.release(&message.id);
            return Err(error.into());
        }

        info!(
            event_name = "loa.review.resolved",
            correlation_id = %ctx.correlation_id,
            user_id = %envelope.actor.user_id,
            message_id = %message.id,
            decision = decision.label(),
            status = ?next,
            "resolved LOA submission"
        );

        let confirmation = if next == LoaStatus::Approved { APPROVED_REPLY } else { DENIED_REPLY };
        self.reply(envelope, ctx, confirmation).await;

        let log_channel = self.log_channel(envelope.guild_id.as_deref(), ctx).await;
        self.mirror(log_channel, updated, ctx).await;

        Ok(WorkflowOutcome::Resolved { message_id: message.id.clone(), status: next })
    }
}
