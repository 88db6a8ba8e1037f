// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per entity.

pub mod agents;
pub mod callbacks;
pub mod calls;
pub mod campaigns;
pub mod customers;
