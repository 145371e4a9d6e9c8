// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per table family.

pub mod delivery;
pub mod digest;
pub mod jobs;
pub mod notifications;
pub mod preferences;
