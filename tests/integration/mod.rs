// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod crawl_pipeline_test;
pub mod dedup_store_test;
pub mod frontier_scenarios_test;
pub mod robots_policy_test;
