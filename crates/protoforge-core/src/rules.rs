/// JDL authoring rules shared by the generation prompts and the MCP instructions.
pub const JDL_RULES: &str = "\
1. One `entity Name { ... }` block per domain concept. Entity names are singular PascalCase \
(\"Product\", \"OrderItem\"), never plural and never prefixed with the application name.\n\
2. One field per line inside the block: `fieldName Type validations`. Field names are camelCase. \
Do not declare an `id` field; every entity gets a numeric id automatically.\n\
3. Use only these types: String, TextBlob, Integer, Long, BigDecimal, Float, Double, Boolean, \
LocalDate, Instant, ZonedDateTime, Duration, UUID, Blob, or the name of an enum declared in the \
same document.\n\
4. Validations follow the type on the same line: required, unique, minlength(n), maxlength(n), \
min(n), max(n), pattern(/regex/). Use maxlength on every free-text String.\n\
5. Closed value sets are enums: `enum OrderStatus { PENDING, SHIPPED, DELIVERED }`, then \
`status OrderStatus required` in the entity.\n\
6. Relationships are grouped by kind: `relationship ManyToOne { OrderItem{order} to Order }`. \
The left side owns the link. Prefer ManyToOne over OneToMany when both read naturally.\n\
7. Keep the model small: 3 to 8 entities that a prototype actually needs. No audit, user-role \
or settings entities unless the requirements name them.\n\
8. Output plain JDL only. No prose, no markdown headings, no application or deployment blocks.";
