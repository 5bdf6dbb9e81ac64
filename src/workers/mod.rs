// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供爬取任务的处理状态机以及工作器的生命周期管理
pub mod crawl_worker;
pub mod manager;
