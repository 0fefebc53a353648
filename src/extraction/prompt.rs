//! 规则抽取指令模板

/// 固定指令：要求以 YAML 输出 {column_name, description, pattern} 列表
pub const RULE_EXTRACTION_INSTRUCTION: &str = r#"You are a regulatory compliance expert. Analyze the attached regulatory document and extract every requirement that can be checked on a single field of a tabular dataset (for example a transaction or customer record).

For each requirement produce:
- column_name: the dataset column the requirement applies to, in snake_case without spaces
- description: one sentence explaining the requirement
- pattern: a regular expression the ENTIRE field value must match

Respond with YAML only, in exactly this shape:

rules:
  - column_name: transaction_id
    description: Transaction ID must be in format TXN-XXXXXX
    pattern: '^TXN-\d{6}$'

Rules:
- Always wrap pattern values in single quotes.
- Use standard regular expression syntax without look-around or backreferences.
- Do not add commentary before or after the YAML.
"#;
