// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel fan-out.
//!
//! For each routed channel the dispatcher creates the `pending` delivery
//! log row (idempotent on the (notification, channel) key) and enqueues
//! the channel job. In-app delivery is synchronous and never suppressed;
//! failures on one channel never touch another.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use deskrelay_core::{
    DeliveryChannel, EmailThreading, JobPayload, Notification, NotificationKind, RelayError,
};
use deskrelay_storage::queries::{delivery, jobs};

use crate::service::NotificationService;

impl NotificationService {
    /// Fan one notification out to its routed channels.
    pub(crate) async fn send_to_channels(
        &self,
        notification: &Notification,
        channels: &BTreeSet<DeliveryChannel>,
    ) {
        for channel in channels {
            if let Err(e) = self.dispatch_channel(notification, *channel).await {
                // Channel isolation: record and move on.
                warn!(
                    notification_id = %notification.id,
                    channel = %channel,
                    error = %e,
                    "channel dispatch failed"
                );
            }
        }
    }

    async fn dispatch_channel(
        &self,
        notification: &Notification,
        channel: DeliveryChannel,
    ) -> Result<(), RelayError> {
        match channel {
            DeliveryChannel::InApp => {
                delivery::create_pending(&self.db, &notification.id, channel, None).await?;
                delivery::mark_sent(&self.db, &notification.id, channel, 1, None).await?;
                Ok(())
            }
            DeliveryChannel::Email => self.dispatch_email(notification).await,
            DeliveryChannel::Push => self.dispatch_push(notification).await,
            DeliveryChannel::Sms => {
                // Enumerated but no transport is wired; record the outcome
                // instead of leaving the row pending forever.
                delivery::create_pending(&self.db, &notification.id, channel, None).await?;
                delivery::mark_failed(
                    &self.db,
                    &notification.id,
                    channel,
                    0,
                    "no sms transport configured",
                )
                .await?;
                Ok(())
            }
            DeliveryChannel::Social => self.dispatch_social(notification).await,
        }
    }

    async fn dispatch_email(&self, notification: &Notification) -> Result<(), RelayError> {
        let channel = DeliveryChannel::Email;
        let recipient = self.directory.user_email(&notification.user_id).await?;
        delivery::create_pending(&self.db, &notification.id, channel, recipient.as_deref())
            .await?;

        let Some(recipient) = recipient else {
            delivery::mark_failed(&self.db, &notification.id, channel, 0, "no email address")
                .await?;
            return Ok(());
        };

        let threading = self.email_threading(notification).await?;
        let payload = JobPayload {
            notification_id: notification.id.clone(),
            channel,
            user_id: notification.user_id.clone(),
            recipient: Some(recipient),
            title: notification.title.clone(),
            body: notification.body.clone(),
            link: self.ticket_link(notification.related_id.as_deref()),
            threading: Some(threading),
            social: None,
        };
        self.enqueue_or_fallback(
            payload,
            notification.kind.priority(),
            self.workers.email_max_attempts,
        )
        .await
    }

    /// Threading block for an outbound email.
    ///
    /// Replies reuse the ticket's original subject and chain onto the
    /// prior outbound message ids for the same ticket, reconstructed from
    /// the delivery log (sent order, deduplicated, creation id first).
    async fn email_threading(
        &self,
        notification: &Notification,
    ) -> Result<EmailThreading, RelayError> {
        if notification.kind != NotificationKind::TicketReply {
            return Ok(EmailThreading {
                subject: notification.title.clone(),
                in_reply_to: None,
                references: Vec::new(),
            });
        }

        let Some(related_id) = notification.related_id.as_deref() else {
            return Ok(EmailThreading {
                subject: notification.title.clone(),
                in_reply_to: None,
                references: Vec::new(),
            });
        };

        let subject = match self.directory.ticket(related_id).await? {
            Some(ticket) => ticket.subject,
            None => notification.title.clone(),
        };
        let references = delivery::email_thread(&self.db, related_id).await?;
        let in_reply_to = references.last().cloned();
        Ok(EmailThreading {
            subject,
            in_reply_to,
            references,
        })
    }

    async fn dispatch_push(&self, notification: &Notification) -> Result<(), RelayError> {
        let channel = DeliveryChannel::Push;
        delivery::create_pending(&self.db, &notification.id, channel, None).await?;
        let payload = JobPayload {
            notification_id: notification.id.clone(),
            channel,
            user_id: notification.user_id.clone(),
            recipient: None,
            title: notification.title.clone(),
            body: notification.body.clone(),
            link: self.ticket_link(notification.related_id.as_deref()),
            threading: None,
            social: None,
        };
        self.enqueue(payload, notification.kind.priority(), self.workers.push_max_attempts)
            .await
    }

    async fn dispatch_social(&self, notification: &Notification) -> Result<(), RelayError> {
        // Social jobs only exist when the metadata carries the social
        // payload; otherwise the channel is a no-op for this notification.
        let Some(deskrelay_core::NotificationMetadata::Social {
            page_id, post_id, ..
        }) = &notification.metadata
        else {
            debug!(
                notification_id = %notification.id,
                "no social payload, skipping social channel"
            );
            return Ok(());
        };

        let channel = DeliveryChannel::Social;
        delivery::create_pending(&self.db, &notification.id, channel, None).await?;
        let payload = JobPayload {
            notification_id: notification.id.clone(),
            channel,
            user_id: notification.user_id.clone(),
            recipient: None,
            title: notification.title.clone(),
            body: notification.body.clone(),
            link: None,
            threading: None,
            social: Some(deskrelay_core::SocialPayload {
                page_id: page_id.clone(),
                post_id: post_id.clone(),
            }),
        };
        self.enqueue(payload, notification.kind.priority(), self.workers.social_max_attempts)
            .await
    }

    async fn enqueue(
        &self,
        payload: JobPayload,
        priority: i32,
        max_attempts: i32,
    ) -> Result<(), RelayError> {
        let key = payload.idempotency_key();
        let queue = payload.channel.queue_name();
        let body = serde_json::to_string(&payload).map_err(|e| RelayError::Internal(
            format!("failed to serialize job payload: {e}"),
        ))?;
        match jobs::enqueue(&self.db, &key, &queue, &body, priority, max_attempts).await? {
            Some(_) => Ok(()),
            None => {
                debug!(idempotency_key = %key, "duplicate enqueue absorbed");
                Ok(())
            }
        }
    }

    /// Email enqueue with the same-process direct-send fallback: a queue
    /// failure must not leave the delivery row pending forever.
    async fn enqueue_or_fallback(
        &self,
        payload: JobPayload,
        priority: i32,
        max_attempts: i32,
    ) -> Result<(), RelayError> {
        let enqueue_err = match self.enqueue(payload.clone(), priority, max_attempts).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        warn!(
            notification_id = %payload.notification_id,
            error = %enqueue_err,
            "email enqueue failed, attempting direct send"
        );

        match &self.email_fallback {
            Some(transport) => match transport.deliver(&payload).await {
                Ok(receipt) => {
                    delivery::mark_sent(
                        &self.db,
                        &payload.notification_id,
                        payload.channel,
                        1,
                        receipt.message_id.as_deref(),
                    )
                    .await
                }
                Err(send_err) => {
                    delivery::mark_failed(
                        &self.db,
                        &payload.notification_id,
                        payload.channel,
                        1,
                        &send_err.to_string(),
                    )
                    .await
                }
            },
            None => {
                delivery::mark_failed(
                    &self.db,
                    &payload.notification_id,
                    payload.channel,
                    0,
                    &format!("queue unavailable: {enqueue_err}"),
                )
                .await
            }
        }
    }

}
