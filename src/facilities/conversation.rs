use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{Local, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;

use crate::facilities::bot_endpoint::BotEndpoint;
use crate::facilities::logger::ConversationLogger;
use crate::facilities::token_cache::TokenCache;
use crate::gateway::{ConversationEvent, EventBroadcaster};
use crate::models::{
    Activity, ApiError, ChannelAccount, ConversationAccount, ErrorCode, LogItem, ResourceResponse,
};
use crate::utils::{is_localhost_url, unique_id};

const REMOTE_BOT_DOCS_URL: &str = "https://aka.ms/cnjvpo";
/// Attachments above this size are left as plain URLs on transcript export.
const MAX_DATA_URL_LENGTH: u64 = 1 << 22;

/// An activity queued for delivery to a polling client, tagged with its
/// position in the conversation.
#[derive(Debug, Clone)]
pub struct ActivityBucket {
    pub activity: Activity,
    pub watermark: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TranscriptRecordKind {
    #[serde(rename = "activity add")]
    ActivityAdd,
    #[serde(rename = "activity update")]
    ActivityUpdate,
    #[serde(rename = "activity delete")]
    ActivityDelete,
    #[serde(rename = "member join")]
    MemberJoin,
    #[serde(rename = "member left")]
    MemberLeft,
    #[serde(rename = "contact update")]
    ContactUpdate,
    #[serde(rename = "contact remove")]
    ContactRemove,
    #[serde(rename = "typing")]
    Typing,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "user data delete")]
    UserDataDelete,
}

/// Durable record of everything that happened in a conversation. Unlike the
/// live activity queue, transcript records survive client polling.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptRecord {
    #[serde(rename = "type")]
    pub kind: TranscriptRecordKind,
    pub activity: Activity,
}

/// Result of relaying an activity toward the bot endpoint.
#[derive(Debug, Clone)]
pub struct PostedActivity {
    pub activity_id: Option<String>,
    pub status: u16,
    pub body: String,
}

impl PostedActivity {
    fn skipped(activity_id: Option<String>) -> Self {
        Self {
            activity_id,
            status: 200,
            body: String::new(),
        }
    }
}

#[derive(Default)]
struct ConversationState {
    members: Vec<ChannelAccount>,
    activities: Vec<ActivityBucket>,
    next_watermark: u64,
    transcript: Vec<TranscriptRecord>,
    state_api_deprecation_warning_shown: bool,
}

/// Stores and propagates conversation messages.
///
/// Tracks members, the watermark-ordered activity queue, and the transcript
/// log; relays outbound activities to the conversation's bot endpoint.
pub struct Conversation {
    pub conversation_id: String,
    pub bot_endpoint: Option<Arc<BotEndpoint>>,
    pub user: ChannelAccount,
    service_url: String,
    state: RwLock<ConversationState>,
    logger: Arc<ConversationLogger>,
    events: Arc<EventBroadcaster>,
    token_cache: Arc<TokenCache>,
    http: reqwest::Client,
}

impl Conversation {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        conversation_id: String,
        bot_endpoint: Option<Arc<BotEndpoint>>,
        user: ChannelAccount,
        service_url: String,
        logger: Arc<ConversationLogger>,
        events: Arc<EventBroadcaster>,
        token_cache: Arc<TokenCache>,
        http: reqwest::Client,
    ) -> Self {
        let bot_id = bot_endpoint
            .as_ref()
            .map(|e| e.bot_id.clone())
            .unwrap_or_else(|| "bot-1".to_string());

        let mut state = ConversationState::default();
        state.members.push(ChannelAccount::new(bot_id, "Bot"));
        state.members.push(ChannelAccount {
            id: user.id.clone(),
            name: user.name.clone(),
            role: None,
        });

        Self {
            conversation_id,
            bot_endpoint,
            user,
            service_url,
            state: RwLock::new(state),
            logger,
            events,
            token_cache,
            http,
        }
    }

    /// Transcript replays live in conversations whose id carries a
    /// "transcript" marker; nothing is ever sent to a real bot for them.
    pub fn is_transcript(&self) -> bool {
        self.conversation_id.contains("transcript")
    }

    pub fn members(&self) -> Vec<ChannelAccount> {
        self.state.read().members.clone()
    }

    pub fn has_member(&self, id: &str) -> bool {
        self.state.read().members.iter().any(|m| m.id == id)
    }

    pub fn next_watermark(&self) -> u64 {
        self.state.read().next_watermark
    }

    /// Check-and-set for the one-time bot state API deprecation warning.
    pub fn state_api_warning_needed(&self) -> bool {
        let mut state = self.state.write();
        if state.state_api_deprecation_warning_shown {
            false
        } else {
            state.state_api_deprecation_warning_shown = true;
            true
        }
    }

    fn bot_id(&self) -> String {
        self.bot_endpoint
            .as_ref()
            .map(|e| e.bot_id.clone())
            .unwrap_or_else(|| "bot-1".to_string())
    }

    /// Stamp an activity with the fields the channel owns: channel id,
    /// conversation reference, id, timestamps, recipient.
    fn postage(&self, recipient_id: &str, mut activity: Activity) -> Activity {
        activity.channel_id = Some("emulator".to_string());
        if activity.conversation.is_none() {
            activity.conversation = Some(ConversationAccount {
                id: self.conversation_id.clone(),
                ..Default::default()
            });
        }
        if activity.id.is_none() {
            activity.id = Some(unique_id());
        }
        activity.local_timestamp = Some(Local::now().to_rfc3339_opts(SecondsFormat::Millis, false));
        activity.timestamp = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        activity.recipient = Some(ChannelAccount {
            id: recipient_id.to_string(),
            name: None,
            role: None,
        });
        activity
    }

    /// Append to the live queue under the next watermark.
    fn add_activity_to_queue(&self, activity: Activity) {
        let role = {
            let mut state = self.state.write();
            let watermark = state.next_watermark;
            state.next_watermark += 1;
            state.activities.push(ActivityBucket {
                activity: activity.clone(),
                watermark,
            });
            activity
                .recipient
                .as_ref()
                .and_then(|r| r.role.clone())
                .unwrap_or_else(|| "user".to_string())
        };

        self.events
            .broadcast(ConversationEvent::activity_added(
                &self.conversation_id,
                &activity,
            ));
        self.logger
            .log_activity(&self.conversation_id, &activity, &role);
    }

    fn record_transcript(&self, kind: TranscriptRecordKind, activity: Activity) {
        self.state
            .write()
            .transcript
            .push(TranscriptRecord { kind, activity });
        self.events
            .broadcast(ConversationEvent::transcript_update(&self.conversation_id));
    }

    /// Sends the activity to the conversation's bot.
    pub async fn post_activity_to_bot(
        &self,
        activity: Activity,
        record_in_conversation: bool,
    ) -> Result<PostedActivity, ApiError> {
        let endpoint = match &self.bot_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => {
                self.logger.log_message(
                    &self.conversation_id,
                    LogItem::error(format!(
                        "This conversation does not have an endpoint, cannot post \"{}\" activity.",
                        activity.activity_type
                    )),
                );
                return Ok(PostedActivity::skipped(None));
            }
        };

        let mut activity = self.postage(&endpoint.bot_id, activity);
        if activity.from.is_none() {
            activity.from = Some(self.user.clone());
        }
        if let Some(recipient) = activity.recipient.as_mut() {
            if recipient.name.is_none() {
                recipient.name = Some("Bot".to_string());
            }
            if recipient.role.is_none() {
                recipient.role = Some("bot".to_string());
            }
        }
        activity.service_url = Some(self.service_url.clone());

        if !self.is_transcript()
            && !is_localhost_url(&endpoint.bot_url)
            && is_localhost_url(&self.service_url)
        {
            self.logger.log_message(
                &self.conversation_id,
                LogItem::error(
                    "Error: The bot is remote, but the service URL is localhost. \
                     Without tunneling software you will not receive replies.",
                ),
            );
            self.logger.log_message(
                &self.conversation_id,
                LogItem::external_link("Connecting to bots hosted remotely", REMOTE_BOT_DOCS_URL),
            );
            self.logger.log_message(
                &self.conversation_id,
                LogItem::app_settings("Edit tunnel settings"),
            );
        }

        if record_in_conversation {
            self.add_activity_to_queue(activity.clone());
        }
        self.record_transcript(TranscriptRecordKind::ActivityAdd, activity.clone());

        // Activities triggered from a transcript replay (e.g. clicking a card
        // button) must not reach a real bot.
        if self.is_transcript() {
            return Ok(PostedActivity::skipped(activity.id));
        }

        let (status, body) = endpoint.fetch_with_auth(&endpoint.bot_url, &activity).await?;

        Ok(PostedActivity {
            activity_id: activity.id,
            status,
            body,
        })
    }

    pub async fn send_conversation_update(
        &self,
        members_added: Option<Vec<ChannelAccount>>,
        members_removed: Option<Vec<ChannelAccount>>,
    ) {
        let mut activity = Activity::of_type("conversationUpdate");
        activity.members_added = members_added;
        activity.members_removed = members_removed;

        if let Err(err) = self.post_activity_to_bot(activity, false).await {
            self.logger.log_exception(&self.conversation_id, &err);
        }
    }

    /// Queues activity for delivery to the user.
    pub fn post_activity_to_user(&self, activity: Activity) -> ResourceResponse {
        let mut activity = self.postage(&self.user.id, activity);
        match activity.from.as_mut() {
            Some(from) => {
                if from.name.is_none() {
                    from.name = Some("Bot".to_string());
                }
            }
            None => {
                activity.from = Some(ChannelAccount {
                    id: self.bot_id(),
                    name: Some("Bot".to_string()),
                    role: Some("bot".to_string()),
                });
            }
        }
        if let Some(recipient) = activity.recipient.as_mut() {
            if recipient.role.is_none() {
                recipient.role = Some("user".to_string());
            }
        }

        self.add_activity_to_queue(activity.clone());
        self.record_transcript(TranscriptRecordKind::ActivityAdd, activity.clone());

        if activity.activity_type == "endOfConversation" {
            self.events
                .broadcast(ConversationEvent::conversation_ended(&self.conversation_id));
        }

        ResourceResponse::new(activity.id.unwrap_or_default())
    }

    /// Replace fields on a queued activity. The activity may already have
    /// been pruned by a poll, in which case it is no longer known.
    pub fn update_activity(&self, update: Activity) -> Result<ResourceResponse, ApiError> {
        let id = update.id.clone().unwrap_or_default();
        let updated = {
            let mut state = self.state.write();
            let index = state
                .activities
                .iter()
                .position(|bucket| bucket.activity.id.as_deref() == Some(id.as_str()))
                .ok_or_else(|| {
                    ApiError::not_found(ErrorCode::BadArgument, "not a known activity id")
                })?;
            state.activities[index].activity.merge(&update);
            state.activities[index].activity.clone()
        };

        self.events.broadcast(ConversationEvent::activity_updated(
            &self.conversation_id,
            &updated,
        ));
        self.record_transcript(TranscriptRecordKind::ActivityUpdate, updated);

        Ok(ResourceResponse::new(id))
    }

    pub fn delete_activity(&self, id: &str) -> Result<(), ApiError> {
        {
            let mut state = self.state.write();
            let index = state
                .activities
                .iter()
                .position(|bucket| bucket.activity.id.as_deref() == Some(id))
                .ok_or_else(|| {
                    ApiError::not_found(ErrorCode::BadArgument, "The activity id was not found")
                })?;
            state.activities.remove(index);
        }

        self.events
            .broadcast(ConversationEvent::activity_deleted(&self.conversation_id, id));

        let mut tombstone = Activity::default();
        tombstone.id = Some(id.to_string());
        self.record_transcript(TranscriptRecordKind::ActivityDelete, tombstone);

        Ok(())
    }

    pub async fn add_member(&self, id: Option<String>, name: Option<String>) -> ChannelAccount {
        let name = name.unwrap_or_else(|| format!("user-{}", unique_id()));
        let id = id.unwrap_or_else(unique_id);
        let user = ChannelAccount::new(id, name);

        self.state.write().members.push(user.clone());
        self.events.broadcast(ConversationEvent::member_joined(
            &self.conversation_id,
            &user,
        ));

        // A conversation without an endpoint has no bot to notify
        if self.bot_endpoint.is_some() {
            self.send_conversation_update(Some(vec![user.clone()]), None)
                .await;
        }

        let mut activity = Activity::of_type("conversationUpdate");
        activity.members_added = Some(vec![user.clone()]);
        self.record_transcript(TranscriptRecordKind::MemberJoin, activity);

        user
    }

    pub async fn remove_member(&self, id: &str) {
        let removed = {
            let mut state = self.state.write();
            state
                .members
                .iter()
                .position(|m| m.id == id)
                .map(|index| state.members.remove(index))
        };

        if let Some(user) = &removed {
            self.events
                .broadcast(ConversationEvent::member_left(&self.conversation_id, user));
        }

        let gone = ChannelAccount {
            id: id.to_string(),
            name: None,
            role: None,
        };
        self.send_conversation_update(None, Some(vec![gone.clone()]))
            .await;

        let mut activity = Activity::of_type("conversationUpdate");
        activity.members_removed = Some(vec![gone]);
        self.record_transcript(TranscriptRecordKind::MemberLeft, activity);
    }

    async fn fire_and_record(&self, activity: Activity, kind: TranscriptRecordKind) {
        if let Err(err) = self.post_activity_to_bot(activity.clone(), false).await {
            self.logger.log_exception(&self.conversation_id, &err);
        }
        self.record_transcript(kind, activity);
    }

    pub async fn send_contact_added(&self) {
        let mut activity = Activity::of_type("contactRelationUpdate");
        activity.action = Some("add".to_string());
        self.fire_and_record(activity, TranscriptRecordKind::ContactUpdate)
            .await;
    }

    pub async fn send_contact_removed(&self) {
        let mut activity = Activity::of_type("contactRelationUpdate");
        activity.action = Some("remove".to_string());
        self.fire_and_record(activity, TranscriptRecordKind::ContactRemove)
            .await;
    }

    pub async fn send_typing(&self) {
        self.fire_and_record(Activity::of_type("typing"), TranscriptRecordKind::Typing)
            .await;
    }

    pub async fn send_ping(&self) {
        self.fire_and_record(Activity::of_type("ping"), TranscriptRecordKind::Ping)
            .await;
    }

    pub async fn send_delete_user_data(&self) {
        self.fire_and_record(
            Activity::of_type("deleteUserData"),
            TranscriptRecordKind::UserDataDelete,
        )
        .await;
    }

    /// Hand an OAuth token to the bot as a `tokens/response` event.
    pub async fn send_token_response(
        &self,
        connection_name: &str,
        token: &str,
        do_not_cache: bool,
    ) -> Result<PostedActivity, ApiError> {
        if !do_not_cache {
            self.token_cache
                .add_token(&self.bot_id(), &self.user.id, connection_name, token);
        }

        let mut activity = Activity::of_type("event");
        activity.name = Some("tokens/response".to_string());
        activity.value = Some(json!({
            "connectionName": connection_name,
            "token": token,
        }));

        self.post_activity_to_bot(activity, false).await
    }

    /// Returns activities at or above the watermark, pruning everything
    /// older from the live queue. The transcript keeps the full history.
    pub fn get_activities_since(&self, watermark: u64) -> (Vec<Activity>, u64) {
        let mut state = self.state.write();
        if watermark > 0 {
            state.activities.retain(|bucket| bucket.watermark >= watermark);
        }
        let activities = state
            .activities
            .iter()
            .map(|bucket| bucket.activity.clone())
            .collect();
        (activities, state.next_watermark)
    }

    /// Load foreign activities (a transcript) into this conversation,
    /// rewriting ids so they read as part of it.
    pub fn feed_activities(&self, mut activities: Vec<Activity>) {
        let curr_user_id = self.user.id.clone();
        let mut orig_user_id: Option<String> = None;
        let mut orig_bot_id: Option<String> = None;

        for activity in activities.iter_mut() {
            if let Some(recipient) = &activity.recipient {
                match recipient.role.as_deref() {
                    Some("bot") if orig_bot_id.is_none() => {
                        orig_bot_id = Some(recipient.id.clone());
                    }
                    Some("user") if orig_user_id.is_none() => {
                        orig_user_id = Some(recipient.id.clone());
                    }
                    _ => {}
                }
            }
            if let Some(conversation) = activity.conversation.as_mut() {
                conversation.id = self.conversation_id.clone();
            }
        }

        if let (Some(endpoint), Some(orig_user_id), Some(orig_bot_id)) =
            (&self.bot_endpoint, &orig_user_id, &orig_bot_id)
        {
            for activity in activities.iter_mut() {
                for account in [activity.recipient.as_mut(), activity.from.as_mut()]
                    .into_iter()
                    .flatten()
                {
                    if account.id == *orig_bot_id {
                        account.id = endpoint.bot_id.clone();
                    } else if account.id == *orig_user_id {
                        account.id = curr_user_id.clone();
                    }
                }
            }
        }

        for activity in activities {
            self.add_activity_to_queue(activity);
        }
    }

    /// Exportable transcript: every recorded activity addition, with
    /// local attachment URLs inlined as data URLs.
    pub async fn get_transcript(&self) -> Vec<Activity> {
        let mut activities: Vec<Activity> = {
            let state = self.state.read();
            state
                .transcript
                .iter()
                .filter(|record| record.kind == TranscriptRecordKind::ActivityAdd)
                .map(|record| record.activity.clone())
                .collect()
        };

        for activity in activities.iter_mut() {
            self.inline_data_urls(activity).await;
        }

        activities
    }

    async fn inline_data_urls(&self, activity: &mut Activity) {
        let Some(attachments) = activity.attachments.as_mut() else {
            return;
        };
        for attachment in attachments.iter_mut() {
            let Some(url) = attachment.content_url.clone() else {
                continue;
            };
            if !should_be_data_url(&url) {
                continue;
            }
            if let Some(data_url) = self.make_data_url(&url).await {
                attachment.content_url = Some(data_url);
            }
        }
    }

    async fn make_data_url(&self, url: &str) -> Option<String> {
        let response = self.http.get(url).send().await.ok()?;
        // Skip bodies the headers already admit are over the limit
        if response.content_length().unwrap_or(0) >= MAX_DATA_URL_LENGTH {
            return None;
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await.ok()?;
        encode_data_url(&content_type, &bytes)
    }
}

/// Local or tunneled content needs inlining; anything else stays a URL.
fn should_be_data_url(url: &str) -> bool {
    is_localhost_url(url) || url.contains("ngrok")
}

/// Inline a payload as a base64 data URL, unless it is too large.
fn encode_data_url(content_type: &str, bytes: &[u8]) -> Option<String> {
    if bytes.len() as u64 >= MAX_DATA_URL_LENGTH {
        return None;
    }
    Some(format!(
        "data:{};base64,{}",
        content_type,
        STANDARD.encode(bytes)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_candidates_are_local_or_tunneled() {
        assert!(should_be_data_url(
            "http://localhost:9001/v3/attachments/a-1/views/original"
        ));
        assert!(should_be_data_url(
            "http://127.0.0.1:9001/v3/attachments/a-1/views/original"
        ));
        assert!(should_be_data_url(
            "https://abc123.ngrok.io/v3/attachments/a-1/views/original"
        ));
        assert!(!should_be_data_url("https://cdn.example.com/cat.png"));
    }

    #[test]
    fn oversized_payloads_are_not_inlined() {
        assert_eq!(
            encode_data_url("text/plain", b"hello").as_deref(),
            Some("data:text/plain;base64,aGVsbG8=")
        );

        let huge = vec![0u8; MAX_DATA_URL_LENGTH as usize];
        assert!(encode_data_url("image/png", &huge).is_none());
    }
}
