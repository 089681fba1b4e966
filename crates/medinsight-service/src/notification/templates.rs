//! Email templates.

/// Name used in a greeting: the local part of `email`, or `there`.
pub fn greeting_name(email: Option<&str>) -> String {
    email
        .and_then(|e| e.split('@').next())
        .filter(|local| !local.is_empty())
        .unwrap_or("there")
        .to_string()
}

/// HTML body of the patient welcome email.
pub fn welcome_email_html(name: &str, message: &str, portal_url: &str) -> String {
    let name = escape_html(name);
    let message = escape_html(message);
    let portal_url = escape_html(portal_url);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Welcome to MedInsight+</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <div style="background: #0b6e99; padding: 30px; border-radius: 10px 10px 0 0;">
        <h1 style="color: white; margin: 0; font-size: 28px;">Welcome to MedInsight+</h1>
    </div>
    <div style="background: #f9f9f9; padding: 30px; border-radius: 0 0 10px 10px;">
        <p>Hello {name},</p>
        <p>{message}</p>
        <p>Your patient record is ready. From the portal you can:</p>
        <ul style="line-height: 2;">
            <li>Review appointments and lab results</li>
            <li>Follow your prescriptions</li>
            <li>Keep your contact details up to date</li>
        </ul>
        <p style="text-align: center; margin: 30px 0;">
            <a href="{portal_url}" style="background: #0b6e99; color: white; padding: 12px 24px; border-radius: 6px; text-decoration: none;">Open the patient portal</a>
        </p>
        <p>The MedInsight+ Team</p>
        <hr style="border: none; border-top: 1px solid #ddd; margin: 30px 0;">
        <p style="font-size: 12px; color: #666; text-align: center;">
            This is an automated message. Please do not reply.
        </p>
    </div>
</body>
</html>
"#
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_name() {
        assert_eq!(greeting_name(Some("jane.doe@example.com")), "jane.doe");
        assert_eq!(greeting_name(None), "there");
    }

    #[test]
    fn test_welcome_html_escapes_content() {
        let html = welcome_email_html("<b>x</b>", "Hi & welcome", "https://portal");
        assert!(html.contains("Hello &lt;b&gt;x&lt;/b&gt;,"));
        assert!(html.contains("Hi &amp; welcome"));
        assert!(html.contains(r#"href="https://portal""#));
    }
}
