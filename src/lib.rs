// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod aggregate;
pub mod balance;
pub mod cli;
pub mod db;
pub mod errors;
pub mod models;
pub mod queries;
pub mod session;
pub mod utils;
pub mod validation;
pub mod commands;
