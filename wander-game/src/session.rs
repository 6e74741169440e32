//! Async host session.
//!
//! A [`Session`] owns a [`Director`] behind a mutex and a [`LineGenerator`].
//! Scheduler calls are synchronous and short; the lock is never held across
//! an await. Reply generation runs outside the lock, bounded by a tokio
//! timeout, and its result (or the timeout) is always delivered back so the
//! ticket resolves exactly once.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use wander_core::{
    Director, EventSink, LocationId, ResponseTicket, SimTime, TicketId, UtteranceOutcome,
    WanderError, secs,
};
use wander_llm::{LineGenerator, LlmClient, LlmError, LlmSettings};

use crate::bridge::{self, LocationTitles};
use crate::config::SessionConfig;
use crate::events::GameEvent;

/// Errors surfaced by the host layer.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The scheduler refused the request.
    #[error(transparent)]
    Core(#[from] WanderError),

    /// The generation backend could not be set up.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Host configuration is invalid.
    #[error("Session configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What handling one event produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventOutcome {
    /// The player entered a location.
    Entered {
        /// Location entered.
        location: LocationId,
        /// New transition counter.
        transition: u64,
    },
    /// A reply was generated (or fell back) and delivered.
    Replied {
        /// The ticket.
        ticket: TicketId,
        /// `false` when the scheduler's own safety net fired first.
        delivered: bool,
    },
    /// The utterance needed no generation.
    Spoken {
        /// What the scheduler decided.
        outcome: UtteranceOutcome,
    },
    /// Game time moved forward.
    Advanced {
        /// Simulated time after advancing.
        now: SimTime,
    },
}

/// Host-side driver for one play session.
pub struct Session<S, G> {
    director: Arc<Mutex<Director<S>>>,
    generator: Arc<G>,
    titles: Arc<Mutex<LocationTitles>>,
    llm: LlmSettings,
    reply_timeout: Duration,
}

impl<S, G> Clone for Session<S, G> {
    fn clone(&self) -> Self {
        Self {
            director: Arc::clone(&self.director),
            generator: Arc::clone(&self.generator),
            titles: Arc::clone(&self.titles),
            llm: self.llm.clone(),
            reply_timeout: self.reply_timeout,
        }
    }
}

impl<S: EventSink> Session<S, LlmClient> {
    /// Build a session whose replies come from the configured backend.
    ///
    /// # Errors
    /// Returns an error if the registry cannot be loaded or the `[llm]`
    /// section is inconsistent.
    pub fn from_config(config: SessionConfig, sink: S) -> Result<Self, SessionError> {
        let client = LlmClient::from_settings(&config.llm)?;
        if !client.is_available() {
            info!("No LLM provider configured; replies will use the fallback line");
        }
        Self::with_generator(config, sink, client)
    }
}

impl<S: EventSink, G: LineGenerator> Session<S, G> {
    /// Build a session with an explicit generator.
    ///
    /// # Errors
    /// Returns an error if the configured registry cannot be loaded.
    pub fn with_generator(config: SessionConfig, sink: S, generator: G) -> Result<Self, SessionError> {
        let registry = config.registry()?;
        let reply_timeout = secs(config.wander.dialogue.response_timeout_secs);
        let director = Director::new(registry, config.wander, sink);
        Ok(Self {
            director: Arc::new(Mutex::new(director)),
            generator: Arc::new(generator),
            titles: Arc::new(Mutex::new(LocationTitles::new())),
            llm: config.llm,
            reply_timeout,
        })
    }

    /// Run `f` with the director locked.
    pub fn with_director<R>(&self, f: impl FnOnce(&mut Director<S>) -> R) -> R {
        f(&mut self.director.lock())
    }

    /// Handle one inbound event.
    ///
    /// Utterances that need a generated reply are awaited here; clone the
    /// session and spawn the call if the host must not wait.
    ///
    /// # Errors
    /// Returns `SessionError::Core` when the scheduler refuses the event
    /// (an utterance to an unknown character).
    pub async fn handle(&self, event: GameEvent) -> Result<EventOutcome, SessionError> {
        debug!(event = event.kind(), "Session event");
        match event {
            GameEvent::LocationEntry {
                location,
                meta,
                player,
            } => {
                self.titles.lock().record(&location, &meta);
                let transition = self.director.lock().enter_location(&location, meta, &player);
                Ok(EventOutcome::Entered {
                    location,
                    transition,
                })
            }
            GameEvent::Utterance { target, text } => {
                let outcome = self.director.lock().handle_utterance(&target, &text)?;
                match outcome {
                    UtteranceOutcome::Awaiting(ticket) => {
                        let id = ticket.id;
                        let delivered = self.respond(ticket).await;
                        Ok(EventOutcome::Replied {
                            ticket: id,
                            delivered,
                        })
                    }
                    outcome => Ok(EventOutcome::Spoken { outcome }),
                }
            }
            GameEvent::Advance { secs: dt } => {
                let mut director = self.director.lock();
                director.advance(secs(dt));
                Ok(EventOutcome::Advanced { now: director.now() })
            }
        }
    }

    /// Generate and deliver the reply for `ticket`.
    ///
    /// Always delivers: a failed or timed-out generation becomes the
    /// fallback line. Returns whether the scheduler accepted the delivery.
    pub async fn respond(&self, ticket: ResponseTicket) -> bool {
        let request = {
            let director = self.director.lock();
            let titles = self.titles.lock();
            bridge::request_for(
                &ticket,
                director.registry().get(&ticket.character),
                &titles,
                &self.llm,
            )
        };

        let result = match tokio::time::timeout(self.reply_timeout, self.generator.generate_line(&request)).await {
            Ok(result) => result,
            Err(_) => {
                let waited = u64::try_from(self.reply_timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(ticket = ticket.id.0, character = %ticket.character, waited_ms = waited, "Reply generation timed out");
                Err(LlmError::Timeout(waited))
            }
        };

        let delivered = self.director.lock().deliver_response(ticket.id, result);
        if !delivered {
            debug!(ticket = ticket.id.0, "Reply arrived after the safety net fired");
        }
        delivered
    }
}
