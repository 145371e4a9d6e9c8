// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel routing for the deskrelay notification engine.
//!
//! Given a user's stored preference (or its absence) and the notification
//! kind, decides which delivery channels apply right now: applies the
//! documented defaults when no preference row exists, suppresses everything
//! but in-app during the user's quiet-hours window unless the kind is
//! always-urgent, and defers email to the digest queue when the user has
//! chosen a non-realtime digest cadence.

use std::collections::BTreeSet;

use chrono::{NaiveTime, Timelike};
use tracing::trace;

use deskrelay_core::{DeliveryChannel, DigestMode, NotificationKind, UserPreference};

/// The router's verdict for one (user, kind) pair at one moment in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    /// Channels to deliver on immediately.
    pub channels: BTreeSet<DeliveryChannel>,
    /// When set, email was enabled but deferred to this digest cadence
    /// instead of being dispatched immediately.
    pub deferred_digest: Option<DigestMode>,
}

impl RoutingDecision {
    pub fn is_immediate(&self, channel: DeliveryChannel) -> bool {
        self.channels.contains(&channel)
    }
}

/// Stateless routing rules. Preference lookup belongs to the caller; the
/// router only interprets what it is handed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelRouter;

impl ChannelRouter {
    pub fn new() -> Self {
        Self
    }

    /// Decide the channel set for one notification.
    ///
    /// `preference` is the stored row for (user, kind), or `None` when the
    /// user never customized this kind. `local_time` is the recipient's
    /// current wall-clock time, used only for the quiet-hours check.
    pub fn determine(
        &self,
        user_id: &str,
        kind: NotificationKind,
        preference: Option<UserPreference>,
        local_time: NaiveTime,
    ) -> RoutingDecision {
        let pref = preference.unwrap_or_else(|| UserPreference::defaults_for(user_id, kind));

        // In-app is always delivered; preferences and quiet hours only
        // govern the external channels.
        let mut channels = BTreeSet::from([DeliveryChannel::InApp]);
        if pref.email {
            channels.insert(DeliveryChannel::Email);
        }
        if pref.push {
            channels.insert(DeliveryChannel::Push);
        }
        if pref.sms {
            channels.insert(DeliveryChannel::Sms);
        }
        if pref.social {
            channels.insert(DeliveryChannel::Social);
        }

        // Quiet hours suppress everything except in-app, but the
        // always-urgent kinds punch straight through the window.
        let now_min = minutes_since_midnight(local_time);
        if pref.quiet_hours_enabled
            && !kind.is_urgent()
            && in_quiet_window(now_min, pref.quiet_start_min, pref.quiet_end_min)
        {
            trace!(user_id, %kind, "quiet hours active, suppressing to in-app");
            channels.retain(|c| *c == DeliveryChannel::InApp);
        }

        // Non-realtime digest defers email rather than dropping it.
        let mut deferred_digest = None;
        if channels.contains(&DeliveryChannel::Email) && pref.digest != DigestMode::Realtime {
            channels.remove(&DeliveryChannel::Email);
            deferred_digest = Some(pref.digest);
        }

        RoutingDecision {
            channels,
            deferred_digest,
        }
    }
}

fn minutes_since_midnight(time: NaiveTime) -> u16 {
    (time.hour() * 60 + time.minute()) as u16
}

/// Inclusive window test in minutes since local midnight. A start greater
/// than the end means the window wraps midnight (e.g. 22:00 to 06:00).
fn in_quiet_window(now: u16, start: u16, end: u16) -> bool {
    if start <= end {
        now >= start && now <= end
    } else {
        now >= start || now <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn quiet_pref(kind: NotificationKind, start: u16, end: u16) -> UserPreference {
        UserPreference {
            quiet_hours_enabled: true,
            quiet_start_min: start,
            quiet_end_min: end,
            email: true,
            push: true,
            ..UserPreference::defaults_for("u-1", kind)
        }
    }

    #[test]
    fn absent_preference_applies_documented_defaults() {
        let router = ChannelRouter::new();

        let assigned =
            router.determine("u-1", NotificationKind::TicketAssigned, None, time(12, 0));
        assert!(assigned.is_immediate(DeliveryChannel::InApp));
        assert!(assigned.is_immediate(DeliveryChannel::Email));
        assert!(!assigned.is_immediate(DeliveryChannel::Push));

        let mention =
            router.determine("u-1", NotificationKind::TicketMention, None, time(12, 0));
        assert_eq!(
            mention.channels,
            BTreeSet::from([DeliveryChannel::InApp])
        );
    }

    #[test]
    fn quiet_window_wrapping_midnight_suppresses_at_half_past_eleven() {
        let router = ChannelRouter::new();
        // 22:00 - 06:00 window, checked at 23:30.
        let pref = quiet_pref(NotificationKind::TicketReply, 22 * 60, 6 * 60);

        let decision = router.determine(
            "u-1",
            NotificationKind::TicketReply,
            Some(pref),
            time(23, 30),
        );
        assert_eq!(
            decision.channels,
            BTreeSet::from([DeliveryChannel::InApp])
        );
        assert!(decision.deferred_digest.is_none());
    }

    #[test]
    fn quiet_window_wrapping_midnight_covers_early_morning() {
        let router = ChannelRouter::new();
        let pref = quiet_pref(NotificationKind::TicketReply, 22 * 60, 6 * 60);

        let decision = router.determine(
            "u-1",
            NotificationKind::TicketReply,
            Some(pref.clone()),
            time(5, 59),
        );
        assert_eq!(
            decision.channels,
            BTreeSet::from([DeliveryChannel::InApp])
        );

        // Just past the window everything is back.
        let decision = router.determine(
            "u-1",
            NotificationKind::TicketReply,
            Some(pref),
            time(6, 1),
        );
        assert!(decision.is_immediate(DeliveryChannel::Email));
        assert!(decision.is_immediate(DeliveryChannel::Push));
    }

    #[test]
    fn sla_breach_bypasses_quiet_hours() {
        let router = ChannelRouter::new();
        let pref = quiet_pref(NotificationKind::SlaBreach, 22 * 60, 6 * 60);

        let decision = router.determine(
            "u-1",
            NotificationKind::SlaBreach,
            Some(pref),
            time(23, 30),
        );
        assert!(decision.is_immediate(DeliveryChannel::Email));
        assert!(decision.is_immediate(DeliveryChannel::Push));
    }

    #[test]
    fn non_wrapping_quiet_window() {
        let router = ChannelRouter::new();
        let pref = quiet_pref(NotificationKind::TicketReply, 9 * 60, 17 * 60);

        let inside = router.determine(
            "u-1",
            NotificationKind::TicketReply,
            Some(pref.clone()),
            time(12, 0),
        );
        assert_eq!(inside.channels, BTreeSet::from([DeliveryChannel::InApp]));

        let outside = router.determine(
            "u-1",
            NotificationKind::TicketReply,
            Some(pref),
            time(18, 0),
        );
        assert!(outside.is_immediate(DeliveryChannel::Email));
    }

    #[test]
    fn hourly_digest_defers_email_but_keeps_other_channels() {
        let router = ChannelRouter::new();
        let pref = UserPreference {
            email: true,
            push: true,
            digest: DigestMode::Hourly,
            ..UserPreference::defaults_for("u-1", NotificationKind::TicketReply)
        };

        let decision = router.determine(
            "u-1",
            NotificationKind::TicketReply,
            Some(pref),
            time(12, 0),
        );
        assert!(!decision.is_immediate(DeliveryChannel::Email));
        assert!(decision.is_immediate(DeliveryChannel::InApp));
        assert!(decision.is_immediate(DeliveryChannel::Push));
        assert_eq!(decision.deferred_digest, Some(DigestMode::Hourly));
    }

    #[test]
    fn digest_does_not_apply_when_email_is_suppressed_by_quiet_hours() {
        let router = ChannelRouter::new();
        let pref = UserPreference {
            digest: DigestMode::Daily,
            ..quiet_pref(NotificationKind::TicketReply, 22 * 60, 6 * 60)
        };

        let decision = router.determine(
            "u-1",
            NotificationKind::TicketReply,
            Some(pref),
            time(23, 30),
        );
        assert_eq!(decision.channels, BTreeSet::from([DeliveryChannel::InApp]));
        assert!(decision.deferred_digest.is_none());
    }

    #[test]
    fn in_app_stays_routed_even_when_the_preference_disables_it() {
        let router = ChannelRouter::new();
        let pref = UserPreference {
            in_app: false,
            ..UserPreference::defaults_for("u-1", NotificationKind::TicketMention)
        };

        let decision = router.determine(
            "u-1",
            NotificationKind::TicketMention,
            Some(pref),
            time(12, 0),
        );
        assert_eq!(decision.channels, BTreeSet::from([DeliveryChannel::InApp]));
    }
}
