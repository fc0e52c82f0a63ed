//! HTML bodies for outgoing mail. Every interpolated value goes through
//! [`escape_html`].

use crate::models::{
    service_label, Lead, LeadSettings, WeeklyReport, UNSPECIFIED_COMPANY_LABEL, UNSPECIFIED_LABEL,
};

const BASE_STYLE: &str = "body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
.container { max-width: 600px; margin: 0 auto; padding: 20px; }
.header { background: linear-gradient(135deg, #06b6d4, #a855f7); padding: 30px; text-align: center; border-radius: 10px 10px 0 0; }
.header h1 { color: white; margin: 0; }
.content { background: #f9fafb; padding: 30px; border-radius: 0 0 10px 10px; }
.info-row { margin: 15px 0; padding: 15px; background: white; border-radius: 8px; border-left: 4px solid #06b6d4; }
.label { font-weight: bold; color: #374151; margin-bottom: 5px; }
.value { color: #6b7280; }
.message-box { background: white; padding: 20px; border-radius: 8px; margin-top: 20px; border: 2px dashed #d1d5db; }
.footer { text-align: center; margin-top: 30px; color: #9ca3af; font-size: 14px; }
.btn { display: inline-block; padding: 12px 24px; background: linear-gradient(135deg, #06b6d4, #a855f7); color: white; text-decoration: none; border-radius: 8px; margin-top: 20px; }";

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.trim().is_empty() {
        placeholder.to_string()
    } else {
        escape_html(value)
    }
}

fn page(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n{}\n</style>\n</head>\n<body>\n<div class=\"container\">\n{}\n</div>\n</body>\n</html>\n",
        BASE_STYLE, body
    )
}

fn info_row(label: &str, value_html: &str) -> String {
    format!(
        "<div class=\"info-row\"><div class=\"label\">{}</div><div class=\"value\">{}</div></div>",
        label, value_html
    )
}

pub fn admin_alert_subject(lead: &Lead) -> String {
    format!("🎯 Nuevo Lead: {}", lead.name)
}

pub fn render_admin_alert(lead: &Lead, settings: &LeadSettings) -> String {
    let email = escape_html(&lead.email);
    let mut rows = vec![
        info_row("👤 Nombre:", &escape_html(&lead.name)),
        info_row("✉️ Email:", &format!("<a href=\"mailto:{}\">{}</a>", email, email)),
        info_row("🏢 Empresa:", &or_placeholder(&lead.company, UNSPECIFIED_COMPANY_LABEL)),
        info_row("📱 Teléfono:", &or_placeholder(&lead.phone, UNSPECIFIED_LABEL)),
        info_row("🎯 Servicio de interés:", service_label(lead.service)),
    ];
    if !lead.message.trim().is_empty() {
        rows.push(format!(
            "<div class=\"message-box\"><div class=\"label\">💬 Mensaje:</div><div class=\"value\">{}</div></div>",
            escape_html(&lead.message)
        ));
    }

    page(&format!(
        "<div class=\"header\"><h1>🎯 Nuevo Lead Recibido</h1></div>\n<div class=\"content\">\n{}\n<div style=\"text-align: center;\"><a href=\"{}\" class=\"btn\">Ver en Panel Admin</a></div>\n</div>\n<div class=\"footer\"><p>Este es un mensaje automático de Nadrika CRM</p></div>",
        rows.join("\n"),
        escape_html(&settings.admin_url())
    ))
}

pub const CONFIRMATION_SUBJECT: &str = "¡Gracias por tu interés en Nadrika!";

pub fn render_lead_confirmation(lead: &Lead, settings: &LeadSettings) -> String {
    page(&format!(
        "<div class=\"header\"><h1>✨ ¡Bienvenido a Nadrika!</h1></div>
<div class=\"content\">
<p style=\"font-size: 20px; color: #111827;\">Hola {name},</p>
<p>¡Gracias por tu interés en nuestras soluciones de Inteligencia Artificial!</p>
<div class=\"info-row\"><strong>📋 Hemos recibido tu solicitud:</strong><br><br>
<strong>Servicio:</strong> {service}<br>
<strong>Empresa:</strong> {company}</div>
<p>Nuestro equipo revisará tu solicitud y se pondrá en contacto contigo <strong>dentro de las próximas 24 horas</strong> para:</p>
<p>✅ Entender mejor tus necesidades<br>✅ Agendar una demo personalizada<br>✅ Responder todas tus preguntas<br>✅ Elaborar una propuesta a tu medida</p>
<div style=\"text-align: center;\"><a href=\"{site}\" class=\"btn\">Visitar nuestro sitio</a></div>
</div>
<div class=\"footer\"><p>Nadrika - Transformando negocios con IA</p><p style=\"font-size: 12px;\">Este es un mensaje automático, por favor no respondas directamente.</p></div>",
        name = escape_html(&lead.name),
        service = service_label(lead.service),
        company = or_placeholder(&lead.company, UNSPECIFIED_COMPANY_LABEL),
        site = escape_html(&settings.site_url),
    ))
}

pub fn digest_subject(report: &WeeklyReport) -> String {
    format!("📊 Reporte Semanal - {} nuevos leads", report.total)
}

pub fn render_weekly_digest(report: &WeeklyReport, settings: &LeadSettings) -> String {
    let services = report
        .by_service
        .iter()
        .map(|(service, count)| format!("<li>{}: {}</li>", service.label(), count))
        .collect::<String>();
    let statuses = report
        .by_status
        .iter()
        .map(|(status, count)| format!("<li>{}: {}</li>", status.label(), count))
        .collect::<String>();
    let offset = settings.offset();

    page(&format!(
        "<h2>Reporte Semanal de Leads</h2>
<p>Del {start} al {end}</p>
<p><strong>Total de leads esta semana:</strong> {total}</p>
<h3>Por servicio:</h3>
<ul>{services}</ul>
<h3>Por estado:</h3>
<ul>{statuses}</ul>
<p><a href=\"{admin}\">Ver panel admin</a></p>",
        start = report.window_start.with_timezone(&offset).format("%d/%m/%Y"),
        end = report.window_end.with_timezone(&offset).format("%d/%m/%Y"),
        total = report.total,
        services = services,
        statuses = statuses,
        admin = escape_html(&settings.admin_url()),
    ))
}
