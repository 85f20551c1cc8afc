use super::extract::MessageHints;

/// Columns every company row is asked for, in display order.
pub const SCHEMA_FIELDS: [&str; 6] = [
    "company_name",
    "industry",
    "funding_stage",
    "funding_amount",
    "established_year",
    "investors",
];

/// Example values shown to the model in the response template. A reply that
/// echoes one of these back has not filled the field in.
pub const TEMPLATE_PLACEHOLDERS: [(&str, &str); 6] = [
    ("company_name", "Company Name"),
    ("industry", "Industry/Sector"),
    ("funding_stage", "Series A/B/C"),
    ("funding_amount", "$X million"),
    ("established_year", "YYYY"),
    ("investors", "Key investors"),
];

/// Build the system prompt for one message.
pub fn build_system_prompt(hints: &MessageHints) -> String {
    let task = match &hints.location {
        Some(location) => format!("Find startups in {}", location),
        None => "List notable startups".to_string(),
    };

    let relevant: Vec<&str> = hints.relevant_fields.iter().map(String::as_str).collect();

    let mut columns: Vec<String> = TEMPLATE_PLACEHOLDERS
        .iter()
        .map(|(key, example)| format!("                        \"{}\": \"{}\"", key, example))
        .collect();
    if let Some(col) = &hints.custom_column {
        // user text, so let serde_json do the quoting
        columns.push(format!(
            "                        {}: {}",
            serde_json::Value::from(col.name.as_str()),
            serde_json::Value::from(col.content.as_str())
        ));
    }

    let (custom_name, custom_content) = match &hints.custom_column {
        Some(col) => (col.name.as_str(), col.content.as_str()),
        None => ("N/A", "N/A"),
    };

    format!(
        r#"You are a highly knowledgeable AI assistant specializing in venture capital and startups.
{task}
Focus on these fields: {relevant}

### RESPONSE FORMAT (STRICT JSON):
{{
    "summary": "Brief overview of the startups",
    "data": {{
        "table_name": "Startup Information",
        "companies": [
            {{
{columns}
            }}
        ]
    }}
}}

### STRICT RULES:
1. Return real startup data, not mock data
2. Keep all existing columns and data
3. Format values consistently:
   - Money: "$XM" or "$XB"
   - Years: YYYY
   - Numbers: Use commas for thousands
4. If adding a custom column, preserve all existing data and add the new column
5. For the custom column "{custom_name}", provide {custom_content}
6. Reply with the JSON object only

Remember: Preserve all existing data when adding new information."#,
        task = task,
        relevant = relevant.join(", "),
        columns = columns.join(",\n"),
        custom_name = custom_name,
        custom_content = custom_content,
    )
}
