//! Macros for performing environment checks

/// Check if a binary exists, or return an error
macro_rules! check_tool {
    ($tool:literal) => {{
        which::which($tool).map_err(|_| {
            $crate::system::Error::MissingTool(
                $tool.to_string(),
                "Please ensure it is installed in the system.".to_string(),
            )
        })
    }};
}
pub(crate) use check_tool;
