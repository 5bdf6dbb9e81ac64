// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // url 的唯一约束是去重的唯一依据
        manager
            .create_table(
                Table::create()
                    .table(CrawledData::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CrawledData::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CrawledData::Url)
                            .text()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(CrawledData::Title).text().not_null())
                    .col(ColumnDef::new(CrawledData::Content).text().not_null())
                    .col(
                        ColumnDef::new(CrawledData::CrawledTime)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_crawled_data_crawled_time")
                    .table(CrawledData::Table)
                    .col(CrawledData::CrawledTime)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CrawledData::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CrawledData {
    Table,
    Id,
    Url,
    Title,
    Content,
    CrawledTime,
}
