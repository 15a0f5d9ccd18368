/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

//! Request and response bodies of the sequence resources.

use seqgen::SequenceDataType;
use seqgen::SequenceDefinition;
use seqgen::SequenceIdentity;
use serde::Deserialize;
use serde::Serialize;
use utoipa::ToSchema;

/// Value handed out or about to be handed out by a sequence.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SequenceValueDto {
    /// The value or `null` if the sequence has run out of values.
    pub value: Option<i64>,
}

/// Declared integer type of a sequence.
#[derive(Debug, Default, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SequenceDataTypeDto {
    /// 16-bit signed integer.
    SmallInt,
    /// 32-bit signed integer.
    #[default]
    Integer,
    /// 64-bit signed integer.
    BigInt,
}

impl From<SequenceDataTypeDto> for SequenceDataType {
    fn from(value: SequenceDataTypeDto) -> Self {
        match value {
            SequenceDataTypeDto::SmallInt => Self::SmallInt,
            SequenceDataTypeDto::Integer => Self::Integer,
            SequenceDataTypeDto::BigInt => Self::BigInt,
        }
    }
}

/// Declaration of a new sequence. Omitted fields use the SQL defaults.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SequenceDefinitionDto {
    #[serde(default)]
    data_type: SequenceDataTypeDto,
    increment: Option<i64>,
    min_value: Option<i64>,
    max_value: Option<i64>,
    start_value: Option<i64>,
    restart_value: Option<i64>,
    #[serde(default)]
    cycle: bool,
}

impl From<SequenceDefinitionDto> for SequenceDefinition {
    fn from(value: SequenceDefinitionDto) -> Self {
        Self {
            data_type: value.data_type.into(),
            increment: value.increment,
            min_value: value.min_value,
            max_value: value.max_value,
            start_value: value.start_value,
            restart_value: value.restart_value,
            cycle: value.cycle,
        }
    }
}

/// Return the sequence addressed by the `{schema}/{name}` path segments.
pub fn identity_from_path(path: (String, String)) -> SequenceIdentity {
    let (schema_name, sequence_name) = path;
    SequenceIdentity::new(&schema_name, &sequence_name)
}
