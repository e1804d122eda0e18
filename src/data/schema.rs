//! Table catalogue handed to the NL→SQL generator as context.

/// Service request tickets
pub const SERVICE_REQUESTS: &str = "service_request_details";
/// Worker capacity per worker type per district
pub const PUBLIC_WORKERS: &str = "public_workers_data";
/// Demographics and static infrastructure
pub const AREA_PROFILES: &str = "area_wise_demographics_infrastructure";
/// Health infrastructure capacity
pub const HEALTH_INFRASTRUCTURE: &str = "health_infrastructure_data";

/// One table description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub table_name: &'static str,
    pub description: &'static str,
    pub columns: &'static [&'static str],
    /// Conventional alias used in generated joins
    pub alias: &'static str,
}

pub const TABLE_SCHEMAS: [TableSchema; 4] = [
    TableSchema {
        table_name: SERVICE_REQUESTS,
        description: "Citizen service requests with resolution details and assignments",
        columns: &[
            "Request_ID", "Created_Timestamp", "Service_Category", "Sub_Category", "Priority",
            "Status", "District", "Area", "Email_ID", "Channel", "Citizen_Age_Group",
            "Resolution_Time_Hours", "Escalated", "Satisfaction_Rating", "Assigned_Department",
            "Worker_Assigned",
        ],
        alias: "s",
    },
    TableSchema {
        table_name: PUBLIC_WORKERS,
        description: "Public worker capacity, availability, and utilization metrics by district",
        columns: &[
            "District", "Worker_Type", "Worker_Type_District", "Total_Workers",
            "Available_Workers", "On_Duty", "Avg_Experience_Years", "Avg_Monthly_Salary_INR",
            "Training_Status", "Utilization_Rate_Percentage", "Avg_Response_Time_Minutes",
        ],
        alias: "w",
    },
    TableSchema {
        table_name: AREA_PROFILES,
        description: "Demographic and static infrastructure data by district",
        columns: &[
            "District", "Population", "Urban_Population_Percentage", "Area_Sq_Km", "Hospitals",
            "Primary_Health_Centers", "Schools", "Police_Stations", "Fire_Stations", "Roads_Km",
            "Water_Treatment_Plants", "Electricity_Substations", "Literacy_Rate",
            "Internet_Penetration_Percentage", "Avg_Income_INR",
        ],
        alias: "a",
    },
    TableSchema {
        table_name: HEALTH_INFRASTRUCTURE,
        description: "Health infrastructure capacity and utilization by district",
        columns: &[
            "District", "Total_Beds", "ICU_Beds", "Ventilators", "Doctors", "Nurses",
            "Ambulances", "Blood_Bank_Units", "Diagnostic_Centers", "Pharmacy_Count",
            "Avg_Bed_Occupancy_Rate", "Emergency_Cases_Per_Month", "Maternal_Health_Centers",
        ],
        alias: "h",
    },
];

/// Where ambiguous columns live. Appended to the schema context.
const COLUMN_LOCATION_NOTES: &[&str] = &[
    "'Population' is ONLY in 'area_wise_demographics_infrastructure' (NOT in health_infrastructure_data)",
    "Health infrastructure columns (Total_Beds, ICU_Beds, Doctors, Nurses, etc.) are in 'health_infrastructure_data'",
    "Worker columns (Total_Workers, Available_Workers, Utilization_Rate_Percentage) are in 'public_workers_data'",
    "Service request columns (Request_ID, Escalated, Resolution_Time_Hours) are in 'service_request_details'",
    "Demographic columns (Population, Literacy_Rate, Avg_Income_INR) are in 'area_wise_demographics_infrastructure'",
    "'District' is NOT unique in 'public_workers_data'; aggregate with GROUP BY \"District\" before joining",
    "All tables have 'District' column for joining",
];

/// Look up a table by name (case-insensitive).
pub fn table_schema(name: &str) -> Option<&'static TableSchema> {
    TABLE_SCHEMAS
        .iter()
        .find(|t| t.table_name.eq_ignore_ascii_case(name.trim()))
}

/// Render the full catalogue for an LLM prompt.
pub fn schema_context() -> String {
    let mut out = String::from("Available tables and columns:\n\n");
    for table in &TABLE_SCHEMAS {
        out.push_str(&format!("Table: {} (alias {})\n", table.table_name, table.alias));
        out.push_str(&format!("Description: {}\n", table.description));
        out.push_str(&format!("Columns: {}\n\n", table.columns.join(", ")));
    }
    out.push_str("IMPORTANT COLUMN LOCATIONS:\n");
    for note in COLUMN_LOCATION_NOTES {
        out.push_str("- ");
        out.push_str(note);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_has_district_key() {
        for table in &TABLE_SCHEMAS {
            let has_district = table.columns.contains(&"District");
            assert!(has_district, "{} must be joinable on District", table.table_name);
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let schema = table_schema("Public_Workers_Data").expect("table present");
        assert_eq!(schema.alias, "w");
        assert!(table_schema("tickets").is_none());
    }

    #[test]
    fn test_context_mentions_all_tables() {
        let ctx = schema_context();
        for table in &TABLE_SCHEMAS {
            assert!(ctx.contains(table.table_name));
        }
        assert!(ctx.contains("GROUP BY"));
    }
}
