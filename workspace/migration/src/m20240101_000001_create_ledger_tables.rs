use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string(Users::Username).unique_key())
                    .col(string_len(Users::CurrencyCode, 3))
                    .to_owned(),
            )
            .await?;

        // Create categories table
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(pk_auto(Categories::Id))
                    .col(integer(Categories::UserId))
                    .col(string(Categories::Name))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_category_user")
                            .from(Categories::Table, Categories::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create tags table
        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(pk_auto(Tags::Id))
                    .col(integer(Tags::UserId))
                    .col(string(Tags::Name))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tag_user")
                            .from(Tags::Table, Tags::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create accounts table
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(pk_auto(Accounts::Id))
                    .col(integer(Accounts::UserId))
                    .col(string(Accounts::Name))
                    .col(string_null(Accounts::Institution))
                    .col(string_len(Accounts::Kind, 20))
                    .col(string_len(Accounts::CurrencyCode, 3))
                    .col(decimal(Accounts::Balance).decimal_len(16, 4))
                    .col(boolean(Accounts::IsActive).default(true))
                    .col(boolean(Accounts::IsManual).default(true))
                    .col(timestamp_null(Accounts::LastSyncedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_account_user")
                            .from(Accounts::Table, Accounts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create transactions table
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(pk_auto(Transactions::Id))
                    .col(integer(Transactions::UserId))
                    .col(integer(Transactions::AccountId))
                    .col(date(Transactions::Date))
                    .col(decimal(Transactions::Amount).decimal_len(16, 4))
                    .col(string(Transactions::Payee))
                    .col(integer_null(Transactions::CategoryId))
                    .col(string_null(Transactions::Notes))
                    .col(boolean(Transactions::IsImported).default(false))
                    .col(string_null(Transactions::ExternalId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transaction_user")
                            .from(Transactions::Table, Transactions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transaction_account")
                            .from(Transactions::Table, Transactions::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transaction_category")
                            .from(Transactions::Table, Transactions::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Aggregations run per account and per (category, month).
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_account")
                    .table(Transactions::Table)
                    .col(Transactions::AccountId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_user_category_date")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::CategoryId)
                    .col(Transactions::Date)
                    .to_owned(),
            )
            .await?;

        // Bank-feed de-duplication: an external id may appear once per
        // account. NULLs are distinct, so manual rows are unaffected.
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_account_external_id")
                    .table(Transactions::Table)
                    .col(Transactions::AccountId)
                    .col(Transactions::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create transactions_tags table (join table)
        manager
            .create_table(
                Table::create()
                    .table(TransactionsTags::Table)
                    .if_not_exists()
                    .col(integer(TransactionsTags::TransactionId))
                    .col(integer(TransactionsTags::TagId))
                    .primary_key(
                        Index::create()
                            .name("pk_transactions_tags")
                            .col(TransactionsTags::TransactionId)
                            .col(TransactionsTags::TagId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_tags_transaction")
                            .from(TransactionsTags::Table, TransactionsTags::TransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_tags_tag")
                            .from(TransactionsTags::Table, TransactionsTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create recurring_templates table
        manager
            .create_table(
                Table::create()
                    .table(RecurringTemplates::Table)
                    .if_not_exists()
                    .col(pk_auto(RecurringTemplates::Id))
                    .col(integer(RecurringTemplates::UserId))
                    .col(integer(RecurringTemplates::AccountId))
                    .col(decimal(RecurringTemplates::Amount).decimal_len(16, 4))
                    .col(string(RecurringTemplates::Payee))
                    .col(integer_null(RecurringTemplates::CategoryId))
                    .col(string_len(RecurringTemplates::Frequency, 10))
                    .col(integer(RecurringTemplates::Interval).default(1))
                    .col(date(RecurringTemplates::StartDate))
                    .col(date_null(RecurringTemplates::EndDate))
                    .col(small_integer_null(RecurringTemplates::DayOfMonth))
                    .col(small_integer_null(RecurringTemplates::DayOfWeek))
                    .col(string_len(RecurringTemplates::Status, 10))
                    .col(date(RecurringTemplates::NextScheduledDate))
                    .col(date_null(RecurringTemplates::LastGeneratedDate))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_recurring_template_user")
                            .from(RecurringTemplates::Table, RecurringTemplates::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_recurring_template_account")
                            .from(RecurringTemplates::Table, RecurringTemplates::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_recurring_template_category")
                            .from(RecurringTemplates::Table, RecurringTemplates::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The due-generation pass scans by status and due date.
        manager
            .create_index(
                Index::create()
                    .name("idx_recurring_templates_status_due")
                    .table(RecurringTemplates::Table)
                    .col(RecurringTemplates::Status)
                    .col(RecurringTemplates::NextScheduledDate)
                    .to_owned(),
            )
            .await?;

        // Create budgets table
        manager
            .create_table(
                Table::create()
                    .table(Budgets::Table)
                    .if_not_exists()
                    .col(pk_auto(Budgets::Id))
                    .col(integer(Budgets::UserId))
                    .col(integer(Budgets::CategoryId))
                    .col(date(Budgets::Month))
                    .col(decimal(Budgets::Amount).decimal_len(16, 4))
                    .col(boolean(Budgets::Rollover).default(false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_budget_user")
                            .from(Budgets::Table, Budgets::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_budget_category")
                            .from(Budgets::Table, Budgets::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_budgets_user_category_month")
                    .table(Budgets::Table)
                    .col(Budgets::UserId)
                    .col(Budgets::CategoryId)
                    .col(Budgets::Month)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create budget_alert_thresholds table
        manager
            .create_table(
                Table::create()
                    .table(BudgetAlertThresholds::Table)
                    .if_not_exists()
                    .col(pk_auto(BudgetAlertThresholds::Id))
                    .col(integer(BudgetAlertThresholds::BudgetId))
                    .col(integer(BudgetAlertThresholds::ThresholdPercent))
                    .col(boolean(BudgetAlertThresholds::Sent).default(false))
                    .col(timestamp_null(BudgetAlertThresholds::SentAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_budget_alert_threshold_budget")
                            .from(
                                BudgetAlertThresholds::Table,
                                BudgetAlertThresholds::BudgetId,
                            )
                            .to(Budgets::Table, Budgets::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create goals table
        manager
            .create_table(
                Table::create()
                    .table(Goals::Table)
                    .if_not_exists()
                    .col(pk_auto(Goals::Id))
                    .col(integer(Goals::UserId))
                    .col(string(Goals::Name))
                    .col(decimal(Goals::TargetAmount).decimal_len(16, 4))
                    .col(decimal(Goals::CurrentAmount).decimal_len(16, 4))
                    .col(integer_null(Goals::LinkedAccountId))
                    .col(date_null(Goals::TargetDate))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_goal_user")
                            .from(Goals::Table, Goals::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_goal_linked_account")
                            .from(Goals::Table, Goals::LinkedAccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create conversion_runs table
        manager
            .create_table(
                Table::create()
                    .table(ConversionRuns::Table)
                    .if_not_exists()
                    .col(pk_auto(ConversionRuns::Id))
                    .col(integer(ConversionRuns::UserId))
                    .col(string_len(ConversionRuns::FromCurrency, 3))
                    .col(string_len(ConversionRuns::ToCurrency, 3))
                    .col(string_len(ConversionRuns::Status, 12))
                    .col(integer(ConversionRuns::TransactionsConverted).default(0))
                    .col(integer(ConversionRuns::AccountsConverted).default(0))
                    .col(integer(ConversionRuns::BudgetsConverted).default(0))
                    .col(integer(ConversionRuns::GoalsConverted).default(0))
                    .col(decimal_null(ConversionRuns::Rate).decimal_len(16, 8))
                    .col(timestamp(ConversionRuns::StartedAt))
                    .col(timestamp_null(ConversionRuns::CompletedAt))
                    .col(string_null(ConversionRuns::ErrorMessage))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_conversion_run_user")
                            .from(ConversionRuns::Table, ConversionRuns::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The exclusivity guard and status polling both query by
        // (user, status).
        manager
            .create_index(
                Index::create()
                    .name("idx_conversion_runs_user_status")
                    .table(ConversionRuns::Table)
                    .col(ConversionRuns::UserId)
                    .col(ConversionRuns::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConversionRuns::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Goals::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(BudgetAlertThresholds::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Budgets::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(RecurringTemplates::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(TransactionsTags::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Tags::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

// Define identifiers for all tables

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    CurrencyCode,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
    UserId,
    Name,
}

#[derive(DeriveIden)]
enum Tags {
    Table,
    Id,
    UserId,
    Name,
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
    UserId,
    Name,
    Institution,
    Kind,
    CurrencyCode,
    Balance,
    IsActive,
    IsManual,
    LastSyncedAt,
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    UserId,
    AccountId,
    Date,
    Amount,
    Payee,
    CategoryId,
    Notes,
    IsImported,
    ExternalId,
}

#[derive(DeriveIden)]
enum TransactionsTags {
    Table,
    TransactionId,
    TagId,
}

#[derive(DeriveIden)]
enum RecurringTemplates {
    Table,
    Id,
    UserId,
    AccountId,
    Amount,
    Payee,
    CategoryId,
    Frequency,
    Interval,
    StartDate,
    EndDate,
    DayOfMonth,
    DayOfWeek,
    Status,
    NextScheduledDate,
    LastGeneratedDate,
}

#[derive(DeriveIden)]
enum Budgets {
    Table,
    Id,
    UserId,
    CategoryId,
    Month,
    Amount,
    Rollover,
}

#[derive(DeriveIden)]
enum BudgetAlertThresholds {
    Table,
    Id,
    BudgetId,
    ThresholdPercent,
    Sent,
    SentAt,
}

#[derive(DeriveIden)]
enum Goals {
    Table,
    Id,
    UserId,
    Name,
    TargetAmount,
    CurrentAmount,
    LinkedAccountId,
    TargetDate,
}

#[derive(DeriveIden)]
enum ConversionRuns {
    Table,
    Id,
    UserId,
    FromCurrency,
    ToCurrency,
    Status,
    TransactionsConverted,
    AccountsConverted,
    BudgetsConverted,
    GoalsConverted,
    Rate,
    StartedAt,
    CompletedAt,
    ErrorMessage,
}
