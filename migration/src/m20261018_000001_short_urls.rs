use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 short_urls 表
        manager
            .create_table(
                Table::create()
                    .table(ShortUrl::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ShortUrl::Alias)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ShortUrl::OriginalUrl).text().not_null())
                    .col(
                        ColumnDef::new(ShortUrl::OriginalHash)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShortUrl::Owner)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(ShortUrl::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ShortUrl::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一 owner 下同一个原始链接只能出现一次
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_owner_original")
                    .table(ShortUrl::Table)
                    .col(ShortUrl::Owner)
                    .col(ShortUrl::OriginalHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 按 owner 列表查询
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_owner_created_at")
                    .table(ShortUrl::Table)
                    .col(ShortUrl::Owner)
                    .col(ShortUrl::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_owner_created_at").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("uq_owner_original").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ShortUrl::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ShortUrl {
    #[sea_orm(iden = "short_urls")]
    Table,
    Alias,
    OriginalUrl,
    OriginalHash,
    Owner,
    Deleted,
    CreatedAt,
}
