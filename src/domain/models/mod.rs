// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 爬取任务（crawl_task）：队列中流转的 URL 与深度
/// - 爬取记录（crawl_record）：以 URL 为唯一键的持久化结果
pub mod crawl_record;
pub mod crawl_task;
