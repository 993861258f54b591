//! Per-message routing: classify, pick a deterministic or model-backed reply, send it.
//!
//! Each message goes `Received -> Classified -> {deterministic | model} reply -> Sent`
//! exactly once. Failures never escape [`MessageRouter::handle`]: delivery errors
//! degrade to an apology in the same thread, and everything else is contained in
//! the component that produced it.

use crate::advisory::AdvisoryClient;
use crate::channels::{ChannelError, ChannelHandle, InboundMessage, OutboundReply};
use crate::config::RouterConfig;
use crate::dispatch::RateLimitedDispatcher;
use crate::emoji::EmojiEmbellisher;
use crate::intent::{Classification, Intent, IntentClassifier};
use crate::oracle::FridayOracle;
use crate::responses::{ResponseCategory, ResponsePool, DEPLOY_APOLOGY, FRIDAY_APOLOGY};
use crate::scheduler::ReplyScheduler;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("reply delivery failed: {0}")]
    Delivery(#[from] ChannelError),
}

/// Which reply strategy handled a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Dramatic reply now, media follow-up later.
    ExplicitFriday,
    /// Verdict for the author's timezone plus optional advisory text.
    DeployToday { timezone: String, friday: bool },
    /// Mentions "deploy" without matching a rule: verdict for the default timezone.
    DeployChatter { friday: bool },
    /// Relayed dispatcher output.
    Model,
}

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub intent: Intent,
    /// `None` when handling failed and an apology was sent instead.
    pub route: Option<Route>,
    /// Replies delivered during handling (delayed follow-ups are not counted).
    pub replies_sent: usize,
}

pub struct MessageRouter {
    config: RouterConfig,
    classifier: IntentClassifier,
    oracle: FridayOracle,
    responses: ResponsePool,
    embellisher: EmojiEmbellisher,
    dispatcher: Arc<RateLimitedDispatcher>,
    advisory: Option<AdvisoryClient>,
    scheduler: ReplyScheduler,
    rng: Mutex<StdRng>,
}

impl MessageRouter {
    pub fn new(
        config: RouterConfig,
        dispatcher: Arc<RateLimitedDispatcher>,
        scheduler: ReplyScheduler,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            classifier: IntentClassifier::new(),
            oracle: FridayOracle::default(),
            responses: ResponsePool::builtin(),
            embellisher: EmojiEmbellisher,
            dispatcher,
            advisory: None,
            scheduler,
            rng: Mutex::new(rng),
        }
    }

    pub fn with_oracle(mut self, oracle: FridayOracle) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_advisory(mut self, advisory: Option<AdvisoryClient>) -> Self {
        self.advisory = advisory;
        self
    }

    pub fn scheduler(&self) -> &ReplyScheduler {
        &self.scheduler
    }

    /// Handle one message end to end. Never fails.
    pub async fn handle(&self, msg: &InboundMessage, channel: Arc<dyn ChannelHandle>) -> Outcome {
        let classification = self.classifier.classify_detailed(&msg.text);
        log::info!(
            "router: message {} from {} classified as {} (rule: {})",
            msg.thread_anchor,
            msg.author_id,
            classification.intent,
            classification.rule.unwrap_or("none")
        );
        let mut sent = 0usize;
        match self.route(msg, &channel, classification, &mut sent).await {
            Ok(route) => {
                log::debug!("router: message {} answered via {:?}", msg.thread_anchor, route);
                Outcome {
                    intent: classification.intent,
                    route: Some(route),
                    replies_sent: sent,
                }
            }
            Err(e) => {
                log::warn!("router: error processing message {}: {}", msg.thread_anchor, e);
                let apology = self.pick(ResponseCategory::Fallback);
                if self.send(&channel, msg, apology).await.is_ok() {
                    sent += 1;
                }
                Outcome {
                    intent: classification.intent,
                    route: None,
                    replies_sent: sent,
                }
            }
        }
    }

    async fn route(
        &self,
        msg: &InboundMessage,
        channel: &Arc<dyn ChannelHandle>,
        classification: Classification,
        sent: &mut usize,
    ) -> Result<Route, HandlerError> {
        match classification.intent {
            Intent::ExplicitFridayQuery => {
                self.explicit_friday(msg, channel, sent).await;
                Ok(Route::ExplicitFriday)
            }
            Intent::DeployTodayQuery => Ok(self.deploy_today(msg, channel, sent).await),
            Intent::Generic if classification.mentions_deploy => {
                let (friday, _) = self.oracle.is_friday_or_utc(&self.config.default_timezone);
                self.send_verdict(channel, msg, friday).await?;
                *sent += 1;
                Ok(Route::DeployChatter { friday })
            }
            Intent::Generic => {
                let answer = self.dispatcher.dispatch(&msg.text).await;
                self.send(channel, msg, answer).await?;
                *sent += 1;
                Ok(Route::Model)
            }
        }
    }

    async fn explicit_friday(
        &self,
        msg: &InboundMessage,
        channel: &Arc<dyn ChannelHandle>,
        sent: &mut usize,
    ) {
        let dramatic = self.pick(ResponseCategory::ExplicitFriday);
        if let Err(e) = self.send(channel, msg, dramatic).await {
            log::warn!("router: friday reply failed: {}", e);
            self.apologize(channel, msg, FRIDAY_APOLOGY, sent).await;
            return;
        }
        *sent += 1;

        let follow_up =
            OutboundReply::threaded(self.config.media_url.clone(), msg.thread_anchor.clone())
                .after(Duration::from_millis(self.config.follow_up_delay_ms));
        let delay = follow_up.delay.unwrap_or_default();
        let channel = channel.clone();
        let conversation = msg.conversation_id.clone();
        let anchor = msg.thread_anchor.clone();
        self.scheduler.schedule(delay, async move {
            if let Err(e) = channel.send_reply(&conversation, &follow_up).await {
                log::warn!("router: friday follow-up failed: {}", e);
                let apology = OutboundReply::threaded(FRIDAY_APOLOGY, anchor);
                if let Err(e) = channel.send_reply(&conversation, &apology).await {
                    log::warn!("router: apology failed too: {}", e);
                }
            }
        });
    }

    async fn deploy_today(
        &self,
        msg: &InboundMessage,
        channel: &Arc<dyn ChannelHandle>,
        sent: &mut usize,
    ) -> Route {
        let requested = self.resolve_timezone(msg, channel).await;
        let (friday, timezone) = self.oracle.is_friday_or_utc(&requested);
        let route = Route::DeployToday {
            timezone: timezone.clone(),
            friday,
        };
        if let Err(e) = self.send_verdict(channel, msg, friday).await {
            log::warn!("router: deploy verdict failed: {}", e);
            self.apologize(channel, msg, DEPLOY_APOLOGY, sent).await;
            return route;
        }
        *sent += 1;

        let Some(advisory) = &self.advisory else {
            return route;
        };
        match advisory.advice(&timezone).await {
            Ok(Some(text)) => match self.send(channel, msg, text).await {
                Ok(()) => *sent += 1,
                Err(e) => log::warn!("router: advisory reply failed: {}", e),
            },
            Ok(None) => log::debug!("router: advisory had no text for {}", timezone),
            Err(e) => log::warn!("router: advisory lookup failed: {}", e),
        }
        route
    }

    /// Message-supplied zone, else the author's profile zone, else the default.
    async fn resolve_timezone(&self, msg: &InboundMessage, channel: &Arc<dyn ChannelHandle>) -> String {
        if let Some(tz) = msg.timezone.as_deref().filter(|t| !t.trim().is_empty()) {
            return tz.to_string();
        }
        match channel.user_timezone(&msg.author_id).await {
            Ok(Some(tz)) => tz,
            Ok(None) => self.config.default_timezone.clone(),
            Err(e) => {
                log::warn!("router: user info lookup for {} failed: {}", msg.author_id, e);
                self.config.default_timezone.clone()
            }
        }
    }

    async fn send_verdict(
        &self,
        channel: &Arc<dyn ChannelHandle>,
        msg: &InboundMessage,
        friday: bool,
    ) -> Result<(), ChannelError> {
        let category = if friday {
            ResponseCategory::Friday
        } else {
            ResponseCategory::OtherDay
        };
        let text = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            let template = self.responses.pick(category, &mut *rng);
            self.embellisher.embellish(template, friday, &mut *rng)
        };
        self.send(channel, msg, text).await
    }

    async fn apologize(
        &self,
        channel: &Arc<dyn ChannelHandle>,
        msg: &InboundMessage,
        text: &str,
        sent: &mut usize,
    ) {
        match self.send(channel, msg, text).await {
            Ok(()) => *sent += 1,
            Err(e) => log::warn!("router: apology failed too: {}", e),
        }
    }

    async fn send(
        &self,
        channel: &Arc<dyn ChannelHandle>,
        msg: &InboundMessage,
        text: impl Into<String>,
    ) -> Result<(), ChannelError> {
        let reply = OutboundReply::threaded(text, msg.thread_anchor.clone());
        channel.send_reply(&msg.conversation_id, &reply).await
    }

    fn pick(&self, category: ResponseCategory) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        self.responses.pick(category, &mut *rng).to_string()
    }
}
