// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod accounts;
pub mod categories;
pub mod movements;
pub mod recurring;
pub mod snapshots;
pub mod reports;
pub mod exporter;
pub mod profile;
pub mod doctor;
