//! Declarations of the functions the model may call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{chat::ToolInvocation, error::ToolError};

pub const WEATHER_TOOL_NAME: &str = "get_weather_matching_location";
pub const LOCATION_ARGUMENT: &str = "user_given_location";

/// Schema of a callable function as presented to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameters {
    #[serde(rename = "type")]
    pub param_type: String,
    pub properties: BTreeMap<String, ToolParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(rename = "additionalProperties", default)]
    pub additional_properties: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    #[serde(rename = "type")]
    pub param_type: ToolParameterType,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterType {
    String,
    Number,
    Integer,
    Boolean,
}

/// The tool set offered on the first request of every turn.
pub fn weather_tools() -> Vec<ToolDefinition> {
    let mut properties = BTreeMap::new();
    properties.insert(
        LOCATION_ARGUMENT.to_string(),
        ToolParameter {
            param_type: ToolParameterType::String,
            description: "The location for which to request the weather. \
                          This might be the place name, a postcode, or abbreviation."
                .to_string(),
        },
    );

    vec![ToolDefinition {
        name: WEATHER_TOOL_NAME.to_string(),
        description: "Get the weather for a location given by a user. \
                      Call this whenever you need to know the weather, for example when a user asks \
                      'What's the weather in New York on September 20, 2024?'"
            .to_string(),
        parameters: ToolParameters {
            param_type: "object".to_string(),
            properties,
            required: vec![LOCATION_ARGUMENT.to_string()],
            additional_properties: false,
        },
    }]
}

/// Checks the call targets the weather tool and pulls out the location text.
pub fn location_argument(invocation: &ToolInvocation) -> Result<&str, ToolError> {
    if invocation.name != WEATHER_TOOL_NAME {
        return Err(ToolError::UnknownTool(invocation.name.clone()));
    }

    invocation
        .arguments
        .get(LOCATION_ARGUMENT)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ToolError::MissingArgument(LOCATION_ARGUMENT))
}
