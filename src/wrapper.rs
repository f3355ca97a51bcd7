//! Bootstrap module that mounts the user's component.
//!
//! The bootstrap is the real entry of a snippet build. It imports the
//! pinned framework, the user's module through the virtual entry
//! specifier, picks the renderable export and mounts it into the preview
//! root. Nothing here executes; it only produces source text.

use crate::policy::SNIPPET_ENTRY_SPECIFIER;
use crate::toolchain::js_string;

/// Element id the bundle mounts into.
pub const PREVIEW_ROOT_ID: &str = "root";

/// Diagnostic name of the bootstrap module.
pub const BOOTSTRAP_SOURCE_NAME: &str = "artifact-bootstrap.js";

pub const ROOT_NOT_FOUND_MESSAGE: &str = "Preview root element not found.";

pub const NO_COMPONENT_MESSAGE: &str =
    "No React component export found. Export a default function component or a named App export.";

/// Source of the bootstrap entry module.
///
/// Export selection order: `default`, then `App`, then the module object
/// itself. Anything that is neither a function nor an object is refused
/// before mounting.
#[must_use]
pub fn bootstrap_source() -> String {
    let entry = js_string(SNIPPET_ENTRY_SPECIFIER);
    let root_id = js_string(PREVIEW_ROOT_ID);
    let root_missing = js_string(ROOT_NOT_FOUND_MESSAGE);
    let no_component = js_string(NO_COMPONENT_MESSAGE);
    format!(
        r#"import React from "react";
import {{ createRoot }} from "react-dom/client";
import * as artifactModule from {entry};

var component = artifactModule.default != null
  ? artifactModule.default
  : artifactModule.App != null
    ? artifactModule.App
    : artifactModule;
var container = document.getElementById({root_id});
if (!container) {{
  throw new Error({root_missing});
}}
if (typeof component !== "function" && (typeof component !== "object" || component === null)) {{
  throw new Error({no_component});
}}
createRoot(container).render(React.createElement(component));
"#
    )
}

#[cfg(test)]
#[path = "wrapper_test.rs"]
mod tests;
