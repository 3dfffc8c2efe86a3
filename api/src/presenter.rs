use crate::model::PricePrediction;
use crate::schema::{FormValues, BARRIO_LABEL, NUMERIC_FIELDS};

/// `12345.678` → `"ARS 12,345.68"`.
pub fn format_currency(value: f64, currency: &str) -> String {
    if !value.is_finite() {
        return format!("{currency} {value}");
    }

    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    // no "-0.00"
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{currency} {sign}{grouped}.{cents}")
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub enum Outcome {
    /// Nothing submitted yet.
    Idle,
    Warning(String),
    Success(PricePrediction),
    Error { message: String, detail: String },
}

pub struct PageView<'a> {
    pub values: &'a FormValues,
    pub load_error: Option<&'a str>,
    pub outcome: Outcome,
}

pub fn render_page(view: &PageView<'_>) -> String {
    let mut html = String::new();
    html.push_str(
        "<!DOCTYPE html>\n<html lang=\"es\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Predicción de precios de Airbnb (Buenos Aires)</title>\n</head>\n<body>\n\
         <h1>Predicción de precios de Airbnb (Buenos Aires)</h1>\n\
         <p>Ingresá las características y obtené el precio estimado por noche.</p>\n",
    );

    if let Some(reason) = view.load_error {
        html.push_str(&format!(
            "<div class=\"error\" role=\"alert\">No se pudo cargar el modelo: {}</div>\n",
            escape_html(reason)
        ));
    }

    html.push_str("<form method=\"post\" action=\"/predict\">\n");
    for spec in NUMERIC_FIELDS {
        let value = view.values.numeric(spec.name).unwrap_or(spec.default);
        html.push_str(&format!(
            "<label for=\"{name}\">{label}</label>\n\
             <input type=\"number\" id=\"{name}\" name=\"{name}\" min=\"{min}\" max=\"{max}\" \
             step=\"{step}\" value=\"{value}\">\n",
            name = spec.name,
            label = escape_html(spec.label),
            min = spec.min,
            max = spec.max,
            step = spec.step,
        ));
    }
    html.push_str(&format!(
        "<label for=\"barrio\">{BARRIO_LABEL}</label>\n\
         <input type=\"text\" id=\"barrio\" name=\"barrio\" required value=\"{}\">\n",
        escape_html(&view.values.barrio)
    ));

    let disabled = if view.load_error.is_some() { " disabled" } else { "" };
    html.push_str(&format!(
        "<button type=\"submit\"{disabled}>Predecir precio</button>\n</form>\n"
    ));

    match &view.outcome {
        Outcome::Idle => {}
        Outcome::Warning(message) => {
            html.push_str(&format!(
                "<div class=\"warning\" role=\"status\">{}</div>\n",
                escape_html(message)
            ));
        }
        Outcome::Success(prediction) => {
            html.push_str(&format!(
                "<h2>Precio estimado por noche:</h2>\n<div class=\"success\">{}</div>\n",
                escape_html(&prediction.formatted)
            ));
            if !prediction.barrio_known {
                html.push_str(&format!(
                    "<div class=\"warning\">Barrio desconocido para el modelo: {}</div>\n",
                    escape_html(&prediction.barrio)
                ));
            }
        }
        Outcome::Error { message, detail } => {
            html.push_str(&format!(
                "<div class=\"error\" role=\"alert\">{}</div>\n<pre>{}</pre>\n",
                escape_html(message),
                escape_html(detail)
            ));
        }
    }

    html.push_str("</body>\n</html>\n");
    html
}
