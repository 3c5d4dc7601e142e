//! 配置校验模块
//!
//! 校验规则：
//! - 数值范围 (帧率 > 0、尺寸 >= 16、zoom <= 19、尾迹 <= 600、workers >= 1 等)，
//!   由 `ConversionBlueprint` 上的 `validator` 派生规则给出
//! - 时区为合法 IANA 名称
//! - sink 名称非空且唯一
//! - 至少一个摄像头角色携带遥测

use std::collections::HashSet;

use chrono_tz::Tz;
use contracts::{ContractError, ConversionBlueprint};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 ConversionBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &ConversionBlueprint) -> Result<(), ContractError> {
    validate_ranges(blueprint)?;
    validate_timezones(blueprint)?;
    validate_tile_template(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 派生规则校验
fn validate_ranges(blueprint: &ConversionBlueprint) -> Result<(), ContractError> {
    match blueprint.validate() {
        Ok(()) => Ok(()),
        Err(errors) => Err(first_error("", &errors).unwrap_or_else(|| {
            ContractError::config_validation("<root>", errors.to_string())
        })),
    }
}

/// 按字段名排序后取第一个错误，保证输出确定
fn first_error(prefix: &str, errors: &ValidationErrors) -> Option<ContractError> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(error) = list.first() {
                    let message = match &error.message {
                        Some(message) => message.to_string(),
                        None => describe(error),
                    };
                    return Some(ContractError::config_validation(path, message));
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                if let Some(error) = first_error(&path, nested) {
                    return Some(error);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    if let Some(error) = first_error(&format!("{path}[{index}]"), nested) {
                        return Some(error);
                    }
                }
            }
        }
    }
    None
}

fn describe(error: &validator::ValidationError) -> String {
    let mut params: Vec<_> = error
        .params
        .iter()
        .filter(|(key, _)| key.to_string() != "value")
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    params.sort();

    let value = error
        .params
        .get("value")
        .map(|v| v.to_string())
        .unwrap_or_default();
    if params.is_empty() {
        format!("{} check failed (got {value})", error.code)
    } else {
        format!(
            "{} check failed: {} (got {value})",
            error.code,
            params.join(", ")
        )
    }
}

/// 校验时区名称
fn validate_timezones(blueprint: &ConversionBlueprint) -> Result<(), ContractError> {
    let overlay = &blueprint.overlay;
    check_timezone("overlay.timezone", &overlay.timezone)?;
    if let Some(device) = &overlay.device_timezone {
        check_timezone("overlay.device_timezone", device)?;
    }
    Ok(())
}

fn check_timezone(field: &str, name: &str) -> Result<(), ContractError> {
    name.parse::<Tz>().map(|_| ()).map_err(|_| {
        ContractError::config_validation(field, format!("unknown IANA timezone '{name}'"))
    })
}

/// 校验瓦片地址模板
fn validate_tile_template(blueprint: &ConversionBlueprint) -> Result<(), ContractError> {
    if !blueprint.map.enabled || blueprint.geo.offline {
        return Ok(());
    }
    let template = &blueprint.geo.tile_url;
    for placeholder in ["{z}", "{x}", "{y}"] {
        if !template.contains(placeholder) {
            return Err(ContractError::config_validation(
                "geo.tile_url",
                format!("tile url template must contain {placeholder}"),
            ));
        }
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &ConversionBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(&sink.name) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkConfig, SinkType};
    use std::collections::HashMap;

    fn minimal_blueprint() -> ConversionBlueprint {
        ConversionBlueprint::default()
    }

    fn field_of(err: ContractError) -> String {
        match err {
            ContractError::ConfigValidation { field, .. } => field,
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_blueprint()).is_ok());
    }

    #[test]
    fn test_zero_frame_rate() {
        let mut bp = minimal_blueprint();
        bp.output.frame_rate = 0.0;
        let field = field_of(validate(&bp).unwrap_err());
        assert_eq!(field, "output.frame_rate");
    }

    #[test]
    fn test_small_window() {
        let mut bp = minimal_blueprint();
        bp.map.width = 8;
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("map.width"), "{err}");
    }

    #[test]
    fn test_zoom_and_trail_limits() {
        let mut bp = minimal_blueprint();
        bp.map.zoom = 20;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "map.zoom");

        let mut bp = minimal_blueprint();
        bp.map.trail_length = 601;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "map.trail_length");
    }

    #[test]
    fn test_gap_threshold_and_cell() {
        let mut bp = minimal_blueprint();
        bp.stitch.gap_threshold_s = 0.0;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "stitch.gap_threshold_s");

        let mut bp = minimal_blueprint();
        bp.overlay.geocode_cell_deg = 1.5;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "overlay.geocode_cell_deg");
    }

    #[test]
    fn test_no_workers() {
        let mut bp = minimal_blueprint();
        bp.runtime.workers = 0;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "runtime.workers");
    }

    #[test]
    fn test_missing_roles() {
        let mut bp = minimal_blueprint();
        bp.input.telemetry_roles.clear();
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("at least one camera role"), "{err}");
    }

    #[test]
    fn test_bad_timezone() {
        let mut bp = minimal_blueprint();
        bp.overlay.timezone = "Mars/Olympus".into();
        assert_eq!(field_of(validate(&bp).unwrap_err()), "overlay.timezone");

        let mut bp = minimal_blueprint();
        bp.overlay.device_timezone = Some("Nowhere".into());
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "overlay.device_timezone"
        );
    }

    #[test]
    fn test_tile_template() {
        let mut bp = minimal_blueprint();
        bp.geo.tile_url = "https://tiles.example/{z}/{x}.png".into();
        assert_eq!(field_of(validate(&bp).unwrap_err()), "geo.tile_url");

        bp.geo.offline = true;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(SinkConfig {
            name: "".into(),
            sink_type: SinkType::Log,
            queue_capacity: 10,
            params: HashMap::new(),
        });
        let result = validate(&bp);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(SinkConfig::png("frames"));
        bp.sinks.push(SinkConfig::png("frames"));
        let result = validate(&bp);
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_sink_queue_capacity() {
        let mut bp = minimal_blueprint();
        let mut sink = SinkConfig::png("frames");
        sink.queue_capacity = 0;
        bp.sinks.push(sink);
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "sinks[0].queue_capacity"
        );
    }
}
