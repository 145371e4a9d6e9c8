// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger API consumed by the rest of the helpdesk.
//!
//! One operation per domain event. Each loads what it needs through the
//! [`Directory`](deskrelay_core::Directory) boundary and derives a
//! deterministic notification id from the logical event, so calling a
//! trigger twice for the same event collapses onto the same notification
//! row and the delivery-log idempotency key absorbs the duplicate fan-out.

use serde_json::json;
use tracing::{debug, warn};

use deskrelay_core::{rooms, NotificationKind, NotificationMetadata, RelayError};
use deskrelay_storage::queries::notifications;

use crate::service::{CreateNotification, NotificationService};

impl NotificationService {
    /// A ticket was created: entity-level refresh for the agent room.
    /// No per-user notification is minted until assignment.
    pub async fn on_ticket_created(&self, ticket_id: &str) -> Result<(), RelayError> {
        let Some(ticket) = self.directory.ticket(ticket_id).await? else {
            return Err(RelayError::NotFound(format!("ticket {ticket_id}")));
        };
        self.emit(
            "ticket:created",
            json!({ "ticket_id": ticket.id, "subject": ticket.subject }),
            vec![rooms::AGENTS.to_string()],
        )
        .await
    }

    /// A ticket was assigned: notify the assignee.
    pub async fn on_ticket_assigned(
        &self,
        ticket_id: &str,
        actor_id: Option<&str>,
    ) -> Result<(), RelayError> {
        let Some(ticket) = self.directory.ticket(ticket_id).await? else {
            return Err(RelayError::NotFound(format!("ticket {ticket_id}")));
        };
        let Some(assignee) = ticket.assignee_id.as_deref() else {
            debug!(ticket_id, "assignment trigger with no assignee, skipping");
            return Ok(());
        };

        let agent_name = actor_id.unwrap_or("someone").to_string();
        let input = CreateNotification {
            id: Some(format!("assigned:{ticket_id}:{assignee}")),
            related_id: Some(ticket.id.clone()),
            actor_id: actor_id.map(str::to_string),
            metadata: Some(NotificationMetadata::Assignment { agent_name }),
            ..CreateNotification::new(
                NotificationKind::TicketAssigned,
                &format!("Ticket assigned: {}", ticket.subject),
                &format!("Ticket #{} has been assigned to you.", ticket.id),
                assignee,
            )
        };
        self.create(input).await?;
        Ok(())
    }

    /// A new reply landed on a ticket: notify the requester (or the
    /// assignee if the requester wrote the reply).
    pub async fn on_new_reply(
        &self,
        ticket_id: &str,
        reply_id: &str,
        author_id: &str,
        excerpt: &str,
    ) -> Result<(), RelayError> {
        let Some(ticket) = self.directory.ticket(ticket_id).await? else {
            return Err(RelayError::NotFound(format!("ticket {ticket_id}")));
        };

        let recipient = if author_id == ticket.requester_id {
            match ticket.assignee_id.as_deref() {
                Some(assignee) => assignee.to_string(),
                None => {
                    debug!(ticket_id, "requester replied to unassigned ticket, skipping");
                    return Ok(());
                }
            }
        } else {
            ticket.requester_id.clone()
        };

        let input = CreateNotification {
            id: Some(format!("reply:{reply_id}:{recipient}")),
            related_id: Some(ticket.id.clone()),
            actor_id: Some(author_id.to_string()),
            metadata: Some(NotificationMetadata::Reply {
                reply_content: excerpt.to_string(),
                agent_name: author_id.to_string(),
            }),
            ..CreateNotification::new(
                NotificationKind::TicketReply,
                &format!("New reply: {}", ticket.subject),
                excerpt,
                &recipient,
            )
        };
        self.create(input).await?;
        Ok(())
    }

    /// A ticket changed status: notify the requester.
    pub async fn on_status_changed(
        &self,
        ticket_id: &str,
        old_status: &str,
        new_status: &str,
        actor_id: Option<&str>,
    ) -> Result<(), RelayError> {
        let Some(ticket) = self.directory.ticket(ticket_id).await? else {
            return Err(RelayError::NotFound(format!("ticket {ticket_id}")));
        };

        let input = CreateNotification {
            id: Some(format!(
                "status:{ticket_id}:{old_status}:{new_status}:{}",
                ticket.requester_id
            )),
            related_id: Some(ticket.id.clone()),
            actor_id: actor_id.map(str::to_string),
            metadata: Some(NotificationMetadata::StatusChange {
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            }),
            ..CreateNotification::new(
                NotificationKind::TicketStatusChanged,
                &format!("Ticket {new_status}: {}", ticket.subject),
                &format!(
                    "Ticket #{} moved from {old_status} to {new_status}.",
                    ticket.id
                ),
                &ticket.requester_id,
            )
        };
        self.create(input).await?;
        Ok(())
    }

    /// An inbound social event (message, comment, or post) for an agent.
    ///
    /// Near-duplicate suppression is time-windowed: a second event for the
    /// same (user, kind, post) inside the configured window is dropped.
    #[allow(clippy::too_many_arguments)]
    pub async fn on_social_event(
        &self,
        kind: NotificationKind,
        user_id: &str,
        page_id: &str,
        post_id: &str,
        author: &str,
        title: &str,
        body: &str,
    ) -> Result<(), RelayError> {
        if !kind.is_social() {
            return Err(RelayError::Validation(format!(
                "{kind} is not a social notification kind"
            )));
        }

        if notifications::recent_exists(&self.db, user_id, kind, post_id, self.dedup_window_secs)
            .await?
        {
            warn!(user_id, post_id, %kind, "duplicate social event suppressed");
            return Ok(());
        }

        let input = CreateNotification {
            id: None,
            related_id: Some(post_id.to_string()),
            actor_id: None,
            metadata: Some(NotificationMetadata::Social {
                page_id: page_id.to_string(),
                post_id: post_id.to_string(),
                author: author.to_string(),
            }),
            ..CreateNotification::new(kind, title, body, user_id)
        };
        self.create(input).await?;
        Ok(())
    }
}
