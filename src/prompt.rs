//! Prompt templates for question-to-SQL translation.
//!
//! A [`PromptTemplate`] is fixed text with `{name}` placeholders for its
//! declared input variables. Rendering substitutes each placeholder in a
//! single left-to-right pass: substituted values are never rescanned, and
//! every byte outside a declared placeholder is copied through unchanged.

use crate::error::{AppError, AppResult};

pub const QUESTION_VAR: &str = "question";
pub const SCHEMA_VAR: &str = "db_schema";

/// Worked question-to-SQL examples shared by both built-in templates.
const FEW_SHOT_EXAMPLES: &str = r#"This is a task converting text into SQL statement. We will first given the dataset schema and then ask a question in
text. You are asked to generate SQL statement.
Here is an example: Convert text to SQL:
[Schema (values)]: | farm | city : city_id , official_name , status , area_km_2 , population ,
census_ranking | farm : farm_id , year , total_horses , working_horses , total_cattle , oxen
, bulls , cows , pigs , sheep_and_goats | farm_competition : competition_id , year , theme ,
host_city_id , hosts | competition_record : competition_id , farm_id , rank;
[Column names (type)]: city : city_id (number)| city : official_name (text)| city : status (text
)| city : area_km_2 (number)| city : population (number)| city : census_ranking (text)| farm
: farm_id (number)| farm : year (number)| farm : total_horses (number)| farm : working_horses
(number)| farm : total_cattle (number)| farm : oxen (number)| farm : bulls (number)| farm
: cows (number)| farm : pigs (number)| farm : sheep_and_goats (number)| farm_competition :
competition_id (number)| farm_competition : year (number)| farm_competition : theme (text)|
farm_competition : host_city_id (number)| farm_competition : hosts (text)| competition_record
: competition_id (number)| competition_record : farm_id (number)| competition_record : rank (
number);
[Primary Keys]: city : city_id | farm : farm_id | farm_competition : competition_id |
competition_record : competition_id;
[Foreign Keys]: farm_competition : host_city_id equals city : city_id | competition_record :
farm_id equals farm : farm_id | competition_record : competition_id equals farm_competition :
competition_id
[Q]: What are the themes of farm competitions sorted by year in ascending order?;
[SQL]: select theme from farm_competition order by year asc;
Here is an example: Convert text to SQL:
[Schema (values)]: | farm | city : city_id , official_name , status , area_km_2 , population ,
census_ranking | farm : farm_id , year , total_horses , working_horses , total_cattle , oxen
, bulls , cows , pigs , sheep_and_goats | farm_competition : competition_id , year , theme ,
host_city_id , hosts | competition_record : competition_id , farm_id , rank;
[Column names (type)]: city : city_id (number)| city : official_name (text)| city : status (text
)| city : area_km_2 (number)| city : population (number)| city : census_ranking (text)| farm
: farm_id (number)| farm : year (number)| farm : total_horses (number)| farm : working_horses
(number)| farm : total_cattle (number)| farm : oxen (number)| farm : bulls (number)| farm
: cows (number)| farm : pigs (number)| farm : sheep_and_goats (number)| farm_competition :
competition_id (number)| farm_competition : year (number)| farm_competition : theme (text)|
farm_competition : host_city_id (number)| farm_competition : hosts (text)| competition_record
: competition_id (number)| competition_record : farm_id (number)| competition_record : rank (
number);
[Primary Keys]: city : city_id | farm : farm_id | farm_competition : competition_id |
competition_record : competition_id; [Foreign Keys]: farm_competition : host_city_id equals
city : city_id | competition_record : farm_id equals farm : farm_id | competition_record :
competition_id equals farm_competition : competition_id
[Q]: What are the maximum and minimum number of cows across all farms.;
[SQL]: select max(cows), min(cows) from farm;
Here is an example: Convert text to SQL:
[Schema (values)]: | department_management | department : department_id , name , creation ,
ranking , budget_in_billions , num_employees | head : head_id , name , born_state , age |
management : department_id , head_id , temporary_acting ( Yes );
[Column names (type)]: department : department_id (number)| department : name (text)| department
: creation (text)| department : ranking (number)| department : budget_in_billions (number)
| department : num_employees (number)| head : head_id (number)| head : name (text)| head :
born_state (text)| head : age (number)| management : department_id (number)| management :
head_id (number)| management : temporary_acting (text);
[Primary Keys]: department : department_id | head : head_id | management : department_id;
[Foreign Keys]: management : head_id equals head : head_id | management : department_id equals
department : department_id
[Q]: Show the name and number of employees for the departments managed by heads whose temporary
acting value is ’Yes’?;
[SQL]: select t1.name, t1.num_employees from department as t1 join management as t2 on t1.
department_id = t2.department_id where t2.temporary_acting = ’Yes’;
Here is an example: Convert text to SQL:
[Schema (values)]: | farm | city : city_id , official_name , status , area_km_2 , population ,
census_ranking | farm : farm_id , year , total_horses , working_horses , total_cattle , oxen
, bulls , cows , pigs , sheep_and_goats | farm_competition : competition_id , year , theme ,
host_city_id , hosts | competition_record : competition_id , farm_id , rank;
[Column names (type)]: city : city_id (number)| city : official_name (text)| city : status (text
)| city : area_km_2 (number)| city : population (number)| city : census_ranking (text)| farm
: farm_id (number)| farm : year (number)| farm : total_horses (number)| farm : working_horses
(number)| farm : total_cattle (number)| farm : oxen (number)| farm : bulls (number)| farm
: cows (number)| farm : pigs (number)| farm : sheep_and_goats (number)| farm_competition :
competition_id (number)| farm_competition : year (number)| farm_competition : theme (text)|
farm_competition : host_city_id (number)| farm_competition : hosts (text)| competition_record
: competition_id (number)| competition_record : farm_id (number)| competition_record : rank (
number);
[Primary Keys]: city : city_id | farm : farm_id | farm_competition : competition_id |
competition_record : competition_id;
[Foreign Keys]: farm_competition : host_city_id equals city : city_id | competition_record :
farm_id equals farm : farm_id | competition_record : competition_id equals farm_competition :
competition_id
[Q]: Show the status of the city that has hosted the greatest number of competitions.;
[SQL]: select t1.status from city as t1 join farm_competition as t2 on t1.city_id = t2.
host_city_id group by t2.host_city_id order by count(*) desc limit 1;
"#;

/// Test section with the EVENTS_DB schema written out inline.
const EVENTS_DB_QUESTION: &str = r#"Here is the test question to be answered: Convert text to SQL:
[Schema (values)]: | EVENTS_DB | CUSTOMERS: CUSTOMER_ID , CUSTOMER_NAME | CUSTOMERS_PLATFORMS: CUSTOMER_ID, PLATFORM_ID, CPC | EVENTS: EVENT_ID, EVENT_TYPE | EVENT_STATISTICS : date, customer_id, platform_id, event_id | PLATFORMS: PLATFORM_ID, PLATFORM_NAME;
[Column names (type)]: CUSTOMERS: CUSTOMER_ID (number)| CUSTOMERS: CUSTOMER_NAME (text)| CUSTOMERS_PLATFORMS: CUSTOMER_ID(number)| CUSTOMERS_PLATFORMS: PLATFORM_ID (number)| CUSTOMERS_PLATFORMS: CPC
(float) | EVENTS: EVENT_ID(number)| EVENTS: EVENT_TYPE (text)| EVENT_STATISTICS : date(datetime)| EVENT_STATISTICS: customer_id(number)| EVENT_STATISTICS:
platform_id(number)| EVENT_STATISTICS: event_id(number)| PLATFORMS: PLATFORM_ID(number)| PLATFORM_NAME(text);
[Primary Keys]: CUSTOMERS: CUSTOMER_ID| EVENTS: EVENT_ID| PLATFORMS: PLATFORM_ID;
[Foreign Keys]: CUSTOMERS_PLATFORMS: CUSTOMER_ID equals CUSTOMERS: CUSTOMER_ID| CUSTOMERS_PLATFORMS: PLATFORM_ID equals PLATFORMS: PLATFORM_ID| EVENT_STATISTICS: customer_id equals CUSTOMERS: customer_id| EVENT_STATISTICS: platform_id equals PLATFORMS: platform_id| EVENT_STATISTICS: event_id equals EVENTS: EVENT_ID;
[Q]: {question};
[SQL]:
"#;

/// Test section that takes the schema description from `{db_schema}`.
const SCHEMA_AWARE_QUESTION: &str = r#"Here is the test question to be answered: Convert text to SQL:
[Schema]:
{db_schema}
[Q]: {question};
[SQL]:
"#;

/// Fixed prompt text with named placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
    input_variables: Vec<String>,
}

impl PromptTemplate {
    /// Create a template. Every declared variable must have a placeholder.
    pub fn new(template: impl Into<String>, input_variables: &[&str]) -> AppResult<Self> {
        let template = template.into();
        for var in input_variables {
            if !template.contains(&format!("{{{}}}", var)) {
                return Err(AppError::invalid_input(format!(
                    "Template declares variable '{}' but has no {{{}}} placeholder",
                    var, var
                )));
            }
        }
        Ok(Self {
            template,
            input_variables: input_variables.iter().map(|v| v.to_string()).collect(),
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    pub fn takes(&self, variable: &str) -> bool {
        self.input_variables.iter().any(|v| v == variable)
    }

    /// Fill the declared placeholders.
    ///
    /// Fails when a declared variable has no value. Values for undeclared
    /// variables are ignored, as are `{...}` sequences that do not name a
    /// declared variable.
    pub fn render(&self, values: &[(&str, &str)]) -> AppResult<String> {
        let lookup = |name: &str| {
            values
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| *v)
        };

        for var in &self.input_variables {
            if lookup(var).is_none() {
                return Err(AppError::invalid_input(format!(
                    "Missing value for prompt variable '{}'",
                    var
                )));
            }
        }

        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let substituted = after.find('}').and_then(|close| {
                let name = &after[..close];
                self.takes(name)
                    .then(|| lookup(name))
                    .flatten()
                    .map(|value| (value, close))
            });
            match substituted {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Few-shot template with the EVENTS_DB schema inlined; takes `{question}`.
pub fn few_shot_template() -> PromptTemplate {
    PromptTemplate {
        template: [FEW_SHOT_EXAMPLES, EVENTS_DB_QUESTION].concat(),
        input_variables: vec![QUESTION_VAR.to_string()],
    }
}

/// Few-shot template that takes both `{question}` and `{db_schema}`.
pub fn schema_aware_template() -> PromptTemplate {
    PromptTemplate {
        template: [FEW_SHOT_EXAMPLES, SCHEMA_AWARE_QUESTION].concat(),
        input_variables: vec![QUESTION_VAR.to_string(), SCHEMA_VAR.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUESTION: &str = "How many LinkedIn clicks did we have in 2022?";

    #[test]
    fn test_question_substituted_rest_untouched() {
        let template = few_shot_template();
        let rendered = template.render(&[(QUESTION_VAR, QUESTION)]).unwrap();

        let (before, after) = template.template().split_once("{question}").unwrap();
        assert!(rendered.starts_with(before));
        assert!(rendered.ends_with(after));
        assert_eq!(rendered.len(), before.len() + QUESTION.len() + after.len());
        assert_eq!(&rendered[before.len()..before.len() + QUESTION.len()], QUESTION);
    }

    #[test]
    fn test_few_shot_ends_with_sql_cue() {
        let rendered = few_shot_template()
            .render(&[(QUESTION_VAR, QUESTION)])
            .unwrap();
        assert!(rendered.ends_with(&format!("[Q]: {};\n[SQL]:\n", QUESTION)));
        assert!(rendered.contains("EVENT_STATISTICS"));
        assert_eq!(rendered.matches("Here is an example").count(), 4);
    }

    #[test]
    fn test_schema_aware_substitutes_both() {
        let rendered = schema_aware_template()
            .render(&[(QUESTION_VAR, QUESTION), (SCHEMA_VAR, "Table: EVENTS")])
            .unwrap();
        assert!(rendered.contains("[Schema]:\nTable: EVENTS\n[Q]: How many LinkedIn"));
        assert!(!rendered.contains("{db_schema}"));
    }

    #[test]
    fn test_missing_variable_is_error() {
        let err = schema_aware_template()
            .render(&[(QUESTION_VAR, QUESTION)])
            .unwrap_err();
        assert!(err.to_string().contains("db_schema"));
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let rendered = schema_aware_template()
            .render(&[(QUESTION_VAR, "{db_schema}"), (SCHEMA_VAR, "S")])
            .unwrap();
        assert!(rendered.contains("[Q]: {db_schema};"));
    }

    #[test]
    fn test_undeclared_braces_left_alone() {
        let template = PromptTemplate::new("a {x} {other} {x", &["x"]).unwrap();
        assert_eq!(template.render(&[("x", "1")]).unwrap(), "a 1 {other} {x");
    }

    #[test]
    fn test_few_shot_ignores_schema_value() {
        let template = few_shot_template();
        let with_schema = template
            .render(&[(QUESTION_VAR, QUESTION), (SCHEMA_VAR, "ignored")])
            .unwrap();
        let without = template.render(&[(QUESTION_VAR, QUESTION)]).unwrap();
        assert_eq!(with_schema, without);
    }

    #[test]
    fn test_new_rejects_undeclared_placeholder() {
        let err = PromptTemplate::new("no placeholders", &["question"]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
    }
}
