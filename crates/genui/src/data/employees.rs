use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::aggregate::{avg_by, count_by, count_by_desc, count_where, format_currency, mean};
use super::{
    contains_ignore_case, equals, parse_filters, to_records, unknown_aggregation, ChartAggregation,
    ChartType, Column, DataSource,
};
use crate::errors::AgentResult;

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "John", "Patricia", "Robert", "Jennifer", "Michael", "Linda", "William",
    "Elizabeth", "David", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Christopher", "Karen", "Charles", "Nancy", "Daniel", "Lisa", "Matthew", "Betty", "Anthony",
    "Margaret", "Mark", "Sandra",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez",
    "Clark", "Ramirez", "Lewis", "Robinson",
];

/// Department, its titles and its salary band.
const DEPARTMENTS: &[(&str, [&str; 5], (u32, u32))] = &[
    ("Engineering", ["Software Engineer", "Senior Software Engineer", "Staff Engineer", "Engineering Manager", "Tech Lead"], (80_000, 200_000)),
    ("Sales", ["Sales Representative", "Senior Sales Rep", "Account Executive", "Sales Manager", "Sales Director"], (60_000, 180_000)),
    ("Marketing", ["Marketing Coordinator", "Marketing Manager", "Content Strategist", "Brand Manager", "CMO"], (55_000, 150_000)),
    ("Finance", ["Financial Analyst", "Senior Analyst", "Finance Manager", "Controller", "CFO"], (70_000, 180_000)),
    ("HR", ["HR Coordinator", "HR Specialist", "HR Manager", "Recruiter", "HR Director"], (50_000, 130_000)),
    ("Operations", ["Operations Analyst", "Operations Manager", "Project Manager", "COO", "Facilities Manager"], (55_000, 140_000)),
    ("Legal", ["Legal Assistant", "Paralegal", "Corporate Counsel", "General Counsel", "Legal Director"], (75_000, 220_000)),
    ("Product", ["Product Manager", "Senior PM", "Product Director", "UX Designer", "Product Analyst"], (85_000, 190_000)),
];

const LOCATIONS: &[&str] = &[
    "New York", "San Francisco", "Chicago", "Austin", "Seattle", "Boston", "Denver", "Remote",
];

const COLUMNS: &[Column] = &[
    Column { key: "id", label: "ID" },
    Column { key: "firstName", label: "First Name" },
    Column { key: "lastName", label: "Last Name" },
    Column { key: "department", label: "Department" },
    Column { key: "title", label: "Title" },
    Column { key: "salary", label: "Salary" },
    Column { key: "location", label: "Location" },
    Column { key: "status", label: "Status" },
];

const AGGREGATIONS: &[ChartAggregation] = &[
    ChartAggregation { key: "byDepartment", label: "Employees by Department", x_key: "name", y_key: "count", recommended_type: ChartType::Bar },
    ChartAggregation { key: "byLocation", label: "Employees by Location", x_key: "name", y_key: "count", recommended_type: ChartType::Bar },
    ChartAggregation { key: "byStatus", label: "Employees by Status", x_key: "name", y_key: "count", recommended_type: ChartType::Pie },
    ChartAggregation { key: "avgSalaryByDept", label: "Average Salary by Department", x_key: "name", y_key: "salary", recommended_type: ChartType::Bar },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmployeeStatus {
    Active,
    OnLeave,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    pub title: String,
    pub salary: u32,
    pub hire_date: NaiveDate,
    pub location: String,
    pub manager: Option<String>,
    pub status: EmployeeStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct EmployeeFilter {
    first_name: Option<String>,
    last_name: Option<String>,
    department: Option<String>,
    title: Option<String>,
    location: Option<String>,
    status: Option<EmployeeStatus>,
    min_salary: Option<f64>,
    max_salary: Option<f64>,
}

impl EmployeeFilter {
    fn matches(&self, e: &Employee) -> bool {
        contains_ignore_case(&e.first_name, &self.first_name)
            && contains_ignore_case(&e.last_name, &self.last_name)
            && equals(&e.department, &self.department)
            && contains_ignore_case(&e.title, &self.title)
            && equals(&e.location, &self.location)
            && self.status.map_or(true, |s| e.status == s)
            && self.min_salary.map_or(true, |min| f64::from(e.salary) >= min)
            && self.max_salary.map_or(true, |max| f64::from(e.salary) <= max)
    }
}

pub struct Employees {
    records: Vec<Employee>,
}

impl Employees {
    pub const NAME: &'static str = "employees";

    /// Fifty employees sorted by last name.
    pub fn generate(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut records = Vec::with_capacity(50);
        let mut managers: Vec<String> = Vec::new();
        let first_hire = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default();
        let last_hire = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default();
        let hire_span = (last_hire - first_hire).num_days();

        for i in 1..=50 {
            let first_name = pick(&mut rng, FIRST_NAMES);
            let last_name = pick(&mut rng, LAST_NAMES);
            let (department, titles, (min_salary, max_salary)) =
                DEPARTMENTS[rng.gen_range(0..DEPARTMENTS.len())];
            let title = pick(&mut rng, &titles);
            let is_manager = ["Manager", "Director", "Lead"]
                .iter()
                .any(|marker| title.contains(marker));

            let salary = rng.gen_range(min_salary..=max_salary) / 1000 * 1000;
            let hire_date = first_hire + chrono::Duration::days(rng.gen_range(0..=hire_span));
            let manager = if is_manager {
                None
            } else {
                managers.choose(&mut rng).cloned()
            };
            let status = if rng.gen_bool(0.9) {
                EmployeeStatus::Active
            } else if rng.gen_bool(0.5) {
                EmployeeStatus::OnLeave
            } else {
                EmployeeStatus::Terminated
            };

            let id = format!("EMP-{:04}", i);
            if is_manager {
                managers.push(id.clone());
            }
            records.push(Employee {
                id,
                email: format!("{}.{}@company.com", first_name.to_lowercase(), last_name.to_lowercase()),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                department: department.to_string(),
                title: title.to_string(),
                salary,
                hire_date,
                location: pick(&mut rng, LOCATIONS).to_string(),
                manager,
                status,
            });
        }

        records.sort_by(|a, b| a.last_name.cmp(&b.last_name));
        Self { records }
    }

    pub fn records(&self) -> &[Employee] {
        &self.records
    }
}

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

impl DataSource for Employees {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Employee directory with department, salary, and location information"
    }

    fn filter_schema(&self) -> Value {
        let departments: Vec<&str> = DEPARTMENTS.iter().map(|(d, _, _)| *d).collect();
        json!({
            "type": "object",
            "properties": {
                "firstName": {"type": "string", "description": "Filter by first name"},
                "lastName": {"type": "string", "description": "Filter by last name"},
                "department": {"type": "string", "enum": departments},
                "title": {"type": "string", "description": "Filter by job title"},
                "location": {"type": "string", "description": "Filter by office location"},
                "status": {"type": "string", "enum": ["ACTIVE", "ON_LEAVE", "TERMINATED"]},
                "minSalary": {"type": "number", "description": "Minimum salary"},
                "maxSalary": {"type": "number", "description": "Maximum salary"}
            }
        })
    }

    fn columns(&self) -> &[Column] {
        COLUMNS
    }

    fn chart_aggregations(&self) -> &[ChartAggregation] {
        AGGREGATIONS
    }

    fn query(&self, filters: &Value) -> AgentResult<Vec<Value>> {
        let filter: EmployeeFilter = parse_filters(Self::NAME, filters)?;
        Ok(to_records(self.records.iter().filter(|e| filter.matches(e))))
    }

    fn aggregate(&self, records: &[Value], kind: &str) -> AgentResult<Vec<Value>> {
        match kind {
            "byDepartment" => Ok(count_by_desc(records, "department")),
            "byLocation" => Ok(count_by_desc(records, "location")),
            "byStatus" => Ok(count_by(records, "status")),
            "avgSalaryByDept" => Ok(avg_by(records, "department", "salary", "salary")),
            _ => Err(unknown_aggregation(Self::NAME, kind)),
        }
    }

    fn summary(&self, records: &[Value]) -> Map<String, Value> {
        let mut summary = Map::new();
        summary.insert("totalEmployees".into(), json!(records.len()));
        summary.insert("avgSalary".into(), json!(format_currency(mean(records, "salary").round())));
        summary.insert("activeCount".into(), json!(count_where(records, "status", "ACTIVE")));
        summary
    }
}
