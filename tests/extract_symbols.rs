//! Extractor behavior over synthesized classes: filtering, ordering, and
//! source pointer resolution.

mod common;

use std::sync::Arc;

use classdex::SymbolKind;
use classdex::archive::FileObject;
use classdex::extract::{NoSources, SymbolExtractor};
use common::{ACC_PRIVATE, ClassBytes, DirResolver};
use tempfile::TempDir;

fn extractor() -> SymbolExtractor {
    SymbolExtractor::new(Arc::new(NoSources))
}

#[test]
fn emits_class_then_methods_then_fields() {
    let bytes = ClassBytes::public("com/acme/Widget")
        .method("render", "()V", None)
        .method("resize", "(II)V", None)
        .field("WIDTH", "I")
        .build();

    let object = FileObject::loose("/out/com/acme/Widget.class");
    let symbols = extractor().extract(&object, &object, &bytes).unwrap();

    let kinds: Vec<SymbolKind> = symbols.iter().map(|s| s.kind()).collect();
    assert_eq!(
        kinds,
        vec![SymbolKind::Class, SymbolKind::Method, SymbolKind::Method, SymbolKind::Field]
    );
    assert_eq!(symbols[0].fqn, "com.acme.Widget");
    assert_eq!(symbols[1].fqn, "com.acme.Widget.render");
    assert_eq!(symbols[1].descriptor.as_deref(), Some("()V"));
    assert_eq!(symbols[2].fqn, "com.acme.Widget.resize");
    assert_eq!(symbols[3].fqn, "com.acme.Widget.WIDTH");
    assert_eq!(symbols[3].internal.as_deref(), Some("com/acme/Widget"));

    for symbol in &symbols {
        assert_eq!(symbol.container, object.uri());
        assert_eq!(symbol.entry, object.uri());
    }
}

#[test]
fn non_public_classes_and_members_yield_nothing() {
    let hidden = ClassBytes::package_private("com/acme/Hidden")
        .method("visibleInBytecodeOnly", "()V", None)
        .build();
    let object = FileObject::loose("/out/com/acme/Hidden.class");
    assert!(extractor().extract(&object, &object, &hidden).unwrap().is_empty());

    let mixed = ClassBytes::public("com/acme/Mixed")
        .method_with_access(ACC_PRIVATE, "secret", "()V", None)
        .field_with_access(ACC_PRIVATE, "state", "I")
        .build();
    let object = FileObject::loose("/out/com/acme/Mixed.class");
    let symbols = extractor().extract(&object, &object, &mixed).unwrap();
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].kind(), SymbolKind::Class);
}

#[test]
fn blacklisted_archive_prefixes_are_skipped() {
    let bytes = ClassBytes::public("sun/misc/Unsafe").build();
    let container = FileObject::loose("/deps/rt.jar");

    for entry_path in ["sun/misc/Unsafe.class", "sunw/x/Y.class", "com/sun/tools/T.class"] {
        let entry = FileObject::entry("/deps/rt.jar", entry_path);
        assert!(extractor().extract(&container, &entry, &bytes).unwrap().is_empty());
    }

    // The same bytes outside a blacklisted prefix do extract.
    let entry = FileObject::entry("/deps/rt.jar", "other/misc/Unsafe.class");
    assert!(!extractor().extract(&container, &entry, &bytes).unwrap().is_empty());
}

#[test]
fn generated_name_fragments_are_dropped() {
    let bytes = ClassBytes::public("com/acme/Widget$$anonfun$1")
        .method("apply", "()V", None)
        .build();
    let object = FileObject::loose("/out/com/acme/Widget$$anonfun$1.class");
    assert!(extractor().extract(&object, &object, &bytes).unwrap().is_empty());

    let worker = ClassBytes::public("com/acme/Pool$worker$Loop").build();
    let object = FileObject::loose("/out/com/acme/Pool$worker$Loop.class");
    assert!(extractor().extract(&object, &object, &worker).unwrap().is_empty());
}

#[test]
fn resolved_source_contributes_line_and_offset() {
    let temp = TempDir::new().unwrap();
    let source_root = temp.path().join("src");
    let source_dir = source_root.join("com/acme");
    std::fs::create_dir_all(&source_dir).unwrap();

    // 30 lines of 10 chars + newline: the nth newline sits at byte 11n - 1.
    let source: String = (0..30).map(|_| "0123456789\n").collect();
    std::fs::write(source_dir.join("Widget.java"), source).unwrap();

    let bytes = ClassBytes::public("com/acme/Widget")
        .source_file("Widget.java")
        .method("render", "()V", Some(12))
        .build();

    let resolver = DirResolver { root: source_root };
    let extractor = SymbolExtractor::new(Arc::new(resolver));
    let object = FileObject::loose("/out/com/acme/Widget.class");
    let symbols = extractor.extract(&object, &object, &bytes).unwrap();

    let class = &symbols[0];
    assert!(class.source.as_deref().unwrap().ends_with("com/acme/Widget.java"));
    assert_eq!(class.line, Some(12));

    let method = &symbols[1];
    assert_eq!(method.line, Some(12));
    // Table entry 11 is the byte index of the 11th newline.
    assert_eq!(method.offset, Some(11 * 11 - 1));
}

#[test]
fn unresolved_source_leaves_pointer_fields_empty() {
    let bytes = ClassBytes::public("com/acme/Widget")
        .source_file("Widget.java")
        .method("render", "()V", Some(12))
        .build();

    let object = FileObject::loose("/out/com/acme/Widget.class");
    let symbols = extractor().extract(&object, &object, &bytes).unwrap();
    assert!(symbols[0].source.is_none());
    assert_eq!(symbols[1].line, Some(12));
    assert_eq!(symbols[1].offset, None);
}
