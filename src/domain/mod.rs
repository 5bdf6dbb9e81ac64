// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：爬取任务与爬取记录
/// - 仓库接口（repositories）：去重存储抽象接口
/// - 服务（services）：链接范围等爬取规则
///

pub mod models;
pub mod repositories;
pub mod services;
