use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(string(Users::Id).primary_key().to_owned())
                    .col(string(Users::Email).not_null().unique_key().to_owned())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Hosts::Table)
                    .if_not_exists()
                    .col(pk_auto(Hosts::Id))
                    .col(string(Hosts::Hostname).not_null().unique_key().to_owned())
                    .col(string(Hosts::DnsNames).default("").not_null().to_owned())
                    .col(string(Hosts::IpAddress).default("").not_null().to_owned())
                    .col(string(Hosts::IssuedBy).default("n/a").not_null().to_owned())
                    .col(small_integer(Hosts::Status).default(0).not_null().to_owned())
                    .col(timestamp_with_time_zone_null(Hosts::ExpiresAt))
                    .col(timestamp_with_time_zone(Hosts::CheckedAt).not_null().to_owned())
                    .col(integer(Hosts::LatencyMs).default(0).not_null().to_owned())
                    .col(string(Hosts::Signature).default("").not_null().to_owned())
                    .col(string_null(Hosts::ErrorMessage))
                    .col(timestamp_with_time_zone_null(Hosts::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserHosts::Table)
                    .if_not_exists()
                    .col(integer(UserHosts::HostId).not_null().to_owned())
                    .col(string(UserHosts::UserId).not_null().to_owned())
                    .primary_key(
                        Index::create()
                            .col(UserHosts::HostId)
                            .col(UserHosts::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_hosts_host_id")
                            .from(UserHosts::Table, UserHosts::HostId)
                            .to(Hosts::Table, Hosts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_hosts_user_id")
                            .from(UserHosts::Table, UserHosts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Settings::Table)
                    .if_not_exists()
                    .col(string(Settings::UserId).primary_key().to_owned())
                    .col(string_null(Settings::WebhookUrl))
                    // Default lead time: one week before expiry.
                    .col(
                        big_integer(Settings::RemindBefore)
                            .default(7 * 24 * 60 * 60)
                            .not_null()
                            .to_owned(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_settings_user_id")
                            .from(Settings::Table, Settings::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(pk_auto(Notifications::Id))
                    .col(string(Notifications::UserId).not_null().to_owned())
                    .col(integer(Notifications::HostId).not_null().to_owned())
                    .col(
                        small_integer(Notifications::Kind)
                            .default(0)
                            .not_null()
                            .to_owned(),
                    )
                    .col(string(Notifications::Body).not_null().to_owned())
                    .col(timestamp_with_time_zone(Notifications::Due).not_null().to_owned())
                    .col(timestamp_with_time_zone_null(Notifications::DeliveredAt))
                    .col(
                        integer(Notifications::Attempts)
                            .default(0)
                            .not_null()
                            .to_owned(),
                    )
                    .col(
                        timestamp_with_time_zone(Notifications::DeletedAfter)
                            .not_null()
                            .to_owned(),
                    )
                    .col(
                        timestamp_with_time_zone(Notifications::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null()
                            .to_owned(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_user_id")
                            .from(Notifications::Table, Notifications::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_host_id")
                            .from(Notifications::Table, Notifications::HostId)
                            .to(Hosts::Table, Hosts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The reminder upsert key: one row per (user, host, due).
        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_user_host_due_unique")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::HostId)
                    .col(Notifications::Due)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_due")
                    .table(Notifications::Table)
                    .col(Notifications::Due)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_notifications_due")
                    .table(Notifications::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_notifications_user_host_due_unique")
                    .table(Notifications::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Settings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserHosts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Hosts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Email,
}

#[derive(Iden)]
enum Hosts {
    Table,
    Id,
    Hostname,
    DnsNames,
    IpAddress,
    IssuedBy,
    Status,
    ExpiresAt,
    CheckedAt,
    LatencyMs,
    Signature,
    ErrorMessage,
    UpdatedAt,
}

#[derive(Iden)]
enum UserHosts {
    Table,
    HostId,
    UserId,
}

#[derive(Iden)]
enum Settings {
    Table,
    UserId,
    WebhookUrl,
    RemindBefore,
}

#[derive(Iden)]
enum Notifications {
    Table,
    Id,
    UserId,
    HostId,
    Kind,
    Body,
    Due,
    DeliveredAt,
    Attempts,
    DeletedAfter,
    CreatedAt,
}
