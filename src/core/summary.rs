//! Presentation of reports.
//!
//! The report structs stay machine-readable; this module renders them either as the
//! Russian-language text operators are used to or as JSON.

use super::{
    generator::GenerationRun,
    migrate::MigrationReport,
    reconcile::{DuplicateReport, Finding, ReconciliationReport, RepairReport},
};
use crate::errors::Result;
use serde::Serialize;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Serializes any report as pretty-printed JSON.
pub fn to_json<T: Serialize>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

fn describe_finding(finding: &Finding) -> String {
    match finding {
        Finding::TemplateWithoutInstances => {
            "⚠️  Нет дочерних операций: генерация не запускалась".to_string()
        }
        Finding::FirstInstanceUnconfirmed { instance_id } => {
            format!("🔧 Первая операция не подтверждена (ID операции: {instance_id})")
        }
        Finding::TemplateMissingFirstInstance => {
            "⚠️  Не найдена первая операция на дату шаблона".to_string()
        }
        Finding::DuplicateInstanceDate { date, instance_ids } => {
            let ids: Vec<String> = instance_ids.iter().map(ToString::to_string).collect();
            format!(
                "🔴 Дубликаты на дату {date}: {} операций (ID: {})",
                instance_ids.len(),
                ids.join(", ")
            )
        }
        Finding::LegacyRecurringOperation {
            operation_id,
            operation_date,
            repeat,
        } => format!(
            "🕰  Операция {operation_id} от {operation_date} повторяется ({repeat}), но не является шаблоном"
        ),
    }
}

/// Formats the result of a reconciliation check.
#[must_use]
pub fn format_check_report(report: &ReconciliationReport) -> String {
    let mut lines = vec![
        format!("🔍 Проверка повторяющихся операций, компания {}", report.company_id),
        format!("📋 Найдено шаблонов: {}", report.templates.len()),
    ];

    for template in &report.templates {
        lines.push(RULE.to_string());
        lines.push(format!("📄 Шаблон: {}", template.description));
        lines.push(format!("   ID: {}", template.template_id));
        lines.push(format!("   Периодичность: {}", template.cadence));
        lines.push(format!("   Дата: {}", template.anchor_date));
        lines.push(format!(
            "   Дочерних операций: {} (подтверждено: {})",
            template.instance_count, template.confirmed_count
        ));
        if template.findings.is_empty() {
            lines.push("   ✅ Проблем не найдено".to_string());
        }
        for finding in &template.findings {
            lines.push(format!("   {}", describe_finding(finding)));
        }
    }

    if !report.legacy.is_empty() {
        lines.push(RULE.to_string());
        lines.push(format!(
            "📦 Повторяющихся операций без шаблона: {} (исправляется командой migrate)",
            report.legacy.len()
        ));
        for finding in &report.legacy {
            lines.push(format!("   {}", describe_finding(finding)));
        }
    }

    lines.push(RULE.to_string());
    lines.push(format!(
        "Требуют вмешательства: {} | Можно исправить: {}",
        report.problem_count(),
        report.fixable_count()
    ));
    lines.join("\n")
}

/// Formats the result of a repair pass.
#[must_use]
pub fn format_repair_report(report: &RepairReport) -> String {
    let mut lines = vec![
        format!(
            "🔧 Исправление первых дочерних операций, компания {}",
            report.company_id
        ),
        format!("📋 Найдено шаблонов: {}", report.templates_scanned),
    ];

    for fixed in &report.fixed {
        lines.push(format!(
            "✅ Подтверждена операция {} шаблона {} на {}",
            fixed.instance_id, fixed.template_id, fixed.date
        ));
    }
    for unresolved in &report.unresolved {
        lines.push(format!(
            "⚠️  Не найдена первая операция для шаблона \"{}\" (ID {}), дата шаблона: {}",
            unresolved.description, unresolved.template_id, unresolved.anchor_date
        ));
    }
    for failure in &report.failures {
        lines.push(format!(
            "❌ Шаблон {}: {} ({})",
            failure.template_id, failure.message, failure.kind
        ));
    }

    lines.push(RULE.to_string());
    lines.push(format!("✅ Исправлено операций: {}", report.fixed_count()));
    lines.push(format!("ℹ️  Уже подтверждены: {}", report.already_confirmed));
    if report.skipped_by_policy > 0 {
        lines.push(format!("ℹ️  Пропущено по политике: {}", report.skipped_by_policy));
    }
    lines.push(format!("❌ Ошибок: {}", report.failures.len()));
    lines.join("\n")
}

/// Formats the result of a generation run.
#[must_use]
pub fn format_generation_run(run: &GenerationRun) -> String {
    let mut lines = vec![format!(
        "🗓  Генерация повторяющихся операций по {}, компания {}",
        run.window.until, run.company_id
    )];

    for template in &run.templates {
        if template.created.is_empty()
            && template.failures.is_empty()
            && template.confirmed_existing.is_empty()
        {
            continue;
        }
        lines.push(format!(
            "📄 {} (ID {})",
            template.description, template.template_id
        ));
        for instance in &template.created {
            let mark = if instance.is_confirmed { " ✔" } else { "" };
            lines.push(format!("   + {}{mark}", instance.operation_date));
        }
        for id in &template.confirmed_existing {
            lines.push(format!("   ✔ подтверждена существующая операция {id}"));
        }
        for failure in &template.failures {
            lines.push(format!("   ⚠️  {} пропущена: {}", failure.date, failure.kind));
        }
    }

    lines.push(RULE.to_string());
    lines.push(format!(
        "Создано: {} | Уже существовали: {} | Ошибок: {}",
        run.created_count(),
        run.already_present_count(),
        run.failure_count()
    ));
    lines.join("\n")
}

/// Formats the result of a legacy migration.
#[must_use]
pub fn format_migration_report(report: &MigrationReport) -> String {
    let mut lines = vec![
        format!(
            "📦 Миграция повторяющихся операций в шаблоны, компания {}",
            report.company_id
        ),
        format!("📋 Найдено операций для миграции: {}", report.found),
    ];

    for promoted in &report.promoted {
        lines.push(format!(
            "   ✅ ID: {}, {}, {} ({}), сумма {}",
            promoted.template_id,
            promoted.description,
            promoted.anchor_date,
            promoted.cadence,
            promoted.amount
        ));
    }
    for skipped in &report.skipped {
        lines.push(format!(
            "   ⚠️  ID: {} пропущена, repeat = \"{}\": {}",
            skipped.operation_id, skipped.repeat, skipped.reason
        ));
    }

    lines.push(RULE.to_string());
    lines.push(format!(
        "Переведено в шаблоны: {} | Пропущено: {}",
        report.promoted.len(),
        report.skipped.len()
    ));
    lines.join("\n")
}

/// Formats the result of a duplicate scan.
#[must_use]
pub fn format_duplicate_report(report: &DuplicateReport) -> String {
    let mut lines = vec![
        format!("🔍 Проверка дубликатов, компания {}", report.company_id),
        format!("📋 Найдено шаблонов: {}", report.templates_scanned),
    ];

    if report.groups.is_empty() {
        lines.push("✅ Дубликатов не найдено".to_string());
    }
    for group in &report.groups {
        let ids: Vec<String> = group.instance_ids.iter().map(ToString::to_string).collect();
        lines.push(format!(
            "🔴 {} (ID {}): дата {}, {} операций: {}",
            group.description,
            group.template_id,
            group.date,
            group.instance_ids.len(),
            ids.join(", ")
        ));
    }
    lines.join("\n")
}
