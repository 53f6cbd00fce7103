//! Integration tests for graph compilation and TypeScript rendering.

use schema_zod::{compile, compile_entities, load_graph_str, EmitOptions, Severity};

fn render(doc: &str) -> String {
    let graph = load_graph_str(doc).unwrap();
    compile(&graph, &EmitOptions::default()).unwrap().render()
}

mod scalars {
    use super::*;

    #[test]
    fn int32_gets_width_bounds() {
        let out = render(
            r#"{ "namespace": "App", "models": [{ "name": "Counter",
                 "properties": [{ "name": "count", "type": "int32" }] }] }"#,
        );
        assert!(out.contains("count: z.number().int().min(-2147483648).max(2147483647),"));
    }

    #[test]
    fn user_bounds_tighten_width_bounds() {
        let out = render(
            r#"{ "namespace": "App",
                 "scalars": [{ "name": "Percent", "extends": "int32", "minValue": 0, "maxValue": 100 }] }"#,
        );
        assert!(out.contains("export const Percent = z.number().int().min(0).max(100);"));
    }

    #[test]
    fn user_scalar_is_referenced_by_name() {
        let out = render(
            r#"{ "namespace": "App",
                 "scalars": [{ "name": "Slug", "extends": "string", "maxLength": 32 }],
                 "models": [{ "name": "Page", "properties": [{ "name": "slug", "type": "Slug" }] }] }"#,
        );
        assert!(out.contains("export const Slug = z.string().max(32);"));
        assert!(out.contains("slug: Slug,"));
    }

    #[test]
    fn int64_maps_to_bigint() {
        let out = render(
            r#"{ "namespace": "App", "models": [{ "name": "Big",
                 "properties": [{ "name": "n", "type": "int64" }] }] }"#,
        );
        assert!(out.contains("n: z.bigint().gte(-9223372036854775808n).lte(9223372036854775807n),"));
    }

    #[test]
    fn documented_scalar_is_described() {
        let out = render(
            r#"{ "namespace": "App",
                 "scalars": [{ "name": "Email", "extends": "string", "doc": "An email address" }] }"#,
        );
        assert!(out.contains(r#"export const Email = z.string().describe("An email address");"#));
    }
}

mod models {
    use super::*;

    #[test]
    fn property_wrappers_in_order() {
        let out = render(
            r#"{ "namespace": "App", "models": [{ "name": "Todo", "properties": [
                 { "name": "done", "type": "boolean", "default": false },
                 { "name": "tags", "type": { "array": "string" }, "minItems": 1, "optional": true },
                 { "name": "note", "type": "string", "optional": true, "doc": "Free text" }
            ] }] }"#,
        );
        assert!(out.contains("done: z.boolean().default(false),"));
        assert!(out.contains("tags: z.array(z.string()).min(1).optional(),"));
        assert!(out.contains(r#"note: z.string().optional().describe("Free text"),"#));
    }

    #[test]
    fn dependencies_are_emitted_first() {
        let out = render(
            r#"{ "namespace": "App", "models": [
                { "name": "Todo", "properties": [{ "name": "owner", "type": "User" }] },
                { "name": "User", "properties": [{ "name": "name", "type": "string" }] }
            ] }"#,
        );
        let user = out.find("export const User =").unwrap();
        let todo = out.find("export const Todo =").unwrap();
        assert!(user < todo);
        assert!(out.contains("owner: User,"));
    }

    #[test]
    fn self_reference_is_lazy() {
        let out = render(
            r#"{ "namespace": "App", "models": [{ "name": "Node", "properties": [
                 { "name": "children", "type": { "array": "Node" } },
                 { "name": "next", "type": "Node", "optional": true }
            ] }] }"#,
        );
        assert!(out.contains("children: z.array(z.lazy(() => Node)),"));
        assert!(out.contains("next: z.lazy(() => Node).optional(),"));
    }

    #[test]
    fn mutual_recursion_compiles_each_once() {
        let out = render(
            r#"{ "namespace": "App", "models": [
                { "name": "A", "properties": [{ "name": "b", "type": "B", "optional": true }] },
                { "name": "B", "properties": [{ "name": "a", "type": "A", "optional": true }] }
            ] }"#,
        );
        assert_eq!(out.matches("export const A =").count(), 1);
        assert_eq!(out.matches("export const B =").count(), 1);
        assert!(out.contains("z.lazy(() =>"));
    }

    #[test]
    fn record_with_properties_is_intersection() {
        let out = render(
            r#"{ "namespace": "App", "models": [
                { "name": "Counts", "indexer": "float64", "properties": [{ "name": "count", "type": "string" }] },
                { "name": "Report", "properties": [{ "name": "counts", "type": "Counts" }] }
            ] }"#,
        );
        // Record wrappers are inlined, never declared.
        assert!(!out.contains("export const Counts"));
        assert!(out.contains("counts: z.intersection(z.object({"));
        assert!(out.contains("count: z.string(),"));
        assert!(out.contains("z.record(z.string(), z.number())),"));
    }

    #[test]
    fn base_model_merges_by_reference() {
        let out = render(
            r#"{ "namespace": "App", "models": [
                { "name": "Base", "properties": [{ "name": "id", "type": "string" }] },
                { "name": "Derived", "extends": "Base", "properties": [{ "name": "extra", "type": "string" }] }
            ] }"#,
        );
        assert!(out.contains("export const Derived = Base.merge(z.object({"));
    }

    #[test]
    fn unresolved_base_degrades_with_diagnostic() {
        let graph = load_graph_str(
            r#"{ "namespace": "App", "models": [{ "name": "Derived", "extends": "Missing",
                 "properties": [{ "name": "a", "type": "string" }] }] }"#,
        )
        .unwrap();
        let compilation = compile(&graph, &EmitOptions::default()).unwrap();

        let diag = &compilation.diagnostics()[0];
        assert_eq!(diag.code, "W001");
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.path, "Derived");

        let out = compilation.render();
        assert!(out.contains("export const Derived = z.object({"));
        assert!(out.contains("a: z.string(),"));
    }

    #[test]
    fn unresolved_property_type_is_unknown() {
        let out = render(
            r#"{ "namespace": "App", "models": [{ "name": "Todo",
                 "properties": [{ "name": "owner", "type": "Person" }] }] }"#,
        );
        assert!(out.contains("owner: z.unknown().describe("));
    }

    #[test]
    fn odd_property_names_are_quoted_or_sanitized() {
        let out = render(
            r#"{ "namespace": "App", "models": [{ "name": "Odd", "properties": [
                 { "name": "content-type", "type": "string" },
                 { "name": "@id", "type": "string" }
            ] }] }"#,
        );
        assert!(out.contains(r#""content-type": z.string(),"#));
        assert!(out.contains("  id: z.string(),"));
    }
}

mod unions_and_enums {
    use super::*;

    #[test]
    fn enveloped_discriminated_union() {
        let out = render(
            r#"{ "namespace": "App",
                 "models": [
                    { "name": "Cat", "properties": [{ "name": "meow", "type": "boolean" }] },
                    { "name": "Dog", "properties": [{ "name": "bark", "type": "boolean" }] }
                 ],
                 "unions": [{ "name": "Pet",
                    "variants": [{ "name": "cat", "type": "Cat" }, { "name": "dog", "type": "Dog" }],
                    "discriminator": { "property": "kind", "envelope": "object", "envelopeProperty": "value" } }] }"#,
        );
        assert!(out.contains(r#"export const Pet = z.discriminatedUnion("kind", [z.object({"#));
        assert!(out.contains(r#"kind: z.literal("cat"),"#));
        assert!(out.contains(r#"kind: z.literal("dog"),"#));
        assert!(out.contains("value: Cat,"));
        assert!(out.contains("value: Dog,"));
    }

    #[test]
    fn plain_union() {
        let out = render(
            r#"{ "namespace": "App",
                 "unions": [{ "name": "Id", "variants": [{ "type": "string" }, { "type": "int32" }] }] }"#,
        );
        assert!(out.contains("export const Id = z.union([z.string(), z.number().int()"));
    }

    #[test]
    fn unresolved_variant_degrades_alone() {
        let graph = load_graph_str(
            r#"{ "namespace": "App",
                 "unions": [{ "name": "Id", "variants": [{ "type": "string" }, { "name": "legacy", "type": "LegacyId" }] }] }"#,
        )
        .unwrap();
        let compilation = compile(&graph, &EmitOptions::default()).unwrap();
        let diagnostics = compilation.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "W001");
        assert_eq!(diagnostics[0].path, "Id/legacy");

        let out = compilation.render();
        assert!(out.contains("export const Id = z.union([z.string(), z.unknown().describe("));
    }

    #[test]
    fn enums_render_first_with_explicit_values() {
        let out = render(
            r#"{ "namespace": "App",
                 "models": [{ "name": "Todo", "properties": [{ "name": "status", "type": "Status" }] }],
                 "enums": [{ "name": "Status", "members": [{ "name": "Open", "value": "open" }, { "name": "Done" }] }] }"#,
        );
        assert!(out.contains("export enum Status {\n  Open = \"open\",\n  Done = \"Done\",\n}"));
        assert!(out.find("export enum Status").unwrap() < out.find("export const Todo").unwrap());
        assert!(out.contains("status: z.nativeEnum(Status),"));
    }

    #[test]
    fn enum_member_reference_is_literal() {
        let out = render(
            r#"{ "namespace": "App",
                 "enums": [{ "name": "Status", "members": [{ "name": "Open", "value": "open" }] }],
                 "models": [{ "name": "OpenTodo", "properties": [{ "name": "status", "type": "Status.Open" }] }] }"#,
        );
        assert!(out.contains(r#"status: z.literal("open"),"#));
    }
}

mod options {
    use super::*;

    const DOC: &str = r#"{ "namespace": "App", "models": [{ "name": "Todo",
        "properties": [{ "name": "id", "type": "int32", "key": true, "visibility": ["read"] },
                       { "name": "title", "type": "string" }] }] }"#;

    #[test]
    fn infer_types_by_default() {
        let out = render(DOC);
        assert!(out.starts_with("import { z } from \"zod\";\n"));
        assert!(out.contains("export type Todo = z.infer<typeof Todo>;"));
    }

    #[test]
    fn custom_module_without_infer() {
        let graph = load_graph_str(DOC).unwrap();
        let options = EmitOptions::new().zod_module("zod/v4").infer_types(false);
        let out = compile(&graph, &options).unwrap().render();
        assert!(out.starts_with("import { z } from \"zod/v4\";\n"));
        assert!(!out.contains("export type"));
    }

    #[test]
    fn entity_views() {
        let graph = load_graph_str(DOC).unwrap();
        let compilation = compile_entities(&graph, None, &EmitOptions::default()).unwrap();
        let names = compilation.names();
        for view in ["ZodTodoGet", "ZodTodoCreate", "ZodTodoUpdate", "ZodTodoDelete"] {
            assert!(names.contains(&view), "missing {view}");
        }

        let out = compilation.render();
        let create_start = out.find("export const ZodTodoCreate").unwrap();
        let create = &out[create_start..];
        let create = &create[..create.find(';').unwrap()];
        assert!(create.contains("title: z.string(),"));
        assert!(!create.contains("id:"));

        let update_start = out.find("export const ZodTodoUpdate").unwrap();
        let update = &out[update_start..];
        let update = &update[..update.find(';').unwrap()];
        assert!(update.contains("title: z.string().optional(),"));
        assert!(update.contains("id: z.number().int()"));
        assert!(!update.contains("id: z.number().int().min(-2147483648).max(2147483647).optional()"));
    }

    #[test]
    fn error_models_get_alias_only() {
        let graph = load_graph_str(
            r#"{ "namespace": "App", "models": [
                { "name": "Todo", "properties": [{ "name": "id", "type": "int32" }] },
                { "name": "NotFound", "error": true, "properties": [{ "name": "code", "type": "int32" }] }
            ] }"#,
        )
        .unwrap();
        let compilation = compile_entities(&graph, None, &EmitOptions::default()).unwrap();
        let names = compilation.names();
        assert!(names.contains(&"ZodNotFound"));
        assert!(!names.contains(&"ZodNotFoundCreate"));
        assert!(compilation.render().contains("export const ZodNotFound = NotFound;"));
    }

    #[test]
    fn explicit_entity_without_key_fails() {
        let graph = load_graph_str(
            r#"{ "namespace": "App", "models": [{ "name": "Note",
                 "properties": [{ "name": "body", "type": "string" }] }], "entities": ["Note"] }"#,
        )
        .unwrap();
        let err = compile_entities(&graph, None, &EmitOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
