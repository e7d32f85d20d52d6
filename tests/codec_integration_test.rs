//! Save/load tests for the diagram document format.

use erd_diagram::diagram::{
    AttributePair, AttributeVisibility, BendPoint, Color, DiagramContainer, EdgeKind, Rect,
    VisualInfo,
};
use erd_diagram::error::MetaResult;
use erd_diagram::meta::{AssociationInfo, AttributeInfo, MetadataProvider, ObjectHandle, ObjectKind};
use erd_diagram::{
    BuildOptions, CancellationToken, Catalog, DefaultDecorator, DiagramCodec, DiagramError,
    EntityGraphBuilder, MetadataError,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn catalog(archive_reachable: bool) -> Arc<Catalog> {
    let yaml = format!(
        r#"
data_sources:
  - id: shop
    name: Shop DB
    containers:
      - name: public
        tables:
          - name: customers
            columns: [id, name]
            primary_key: [id]
          - name: orders
            columns: [id, customer_id]
            primary_key: [id]
            foreign_keys:
              - name: fk_orders_customer
                columns: [customer_id]
                references: customers
          - name: order_items
            columns: [order_id, sku]
            foreign_keys:
              - name: fk_items_order
                columns: [order_id]
                references: orders
      - name: audit
        tables:
          - name: log
            columns: [id, customer_id]
            primary_key: [id]
  - id: archive
    name: Archive
    reachable: {}
    tables:
      - name: old_orders
        columns: [id]
        primary_key: [id]
"#,
        archive_reachable
    );
    Arc::new(Catalog::from_yaml(&yaml).unwrap())
}

fn empty(catalog: &Arc<Catalog>) -> DiagramContainer {
    DiagramContainer::new(catalog.clone(), Arc::new(DefaultDecorator::default()))
}

fn find(catalog: &Catalog, path: &str) -> ObjectHandle {
    let (ds, path) = path.split_once(':').unwrap();
    catalog.find(ds, path).unwrap()
}

/// Every entity of the catalog, with layout, a logical edge, bends and a note
fn sample(catalog: &Arc<Catalog>, relative_bend: bool) -> DiagramContainer {
    let mut container = empty(catalog);
    container.set_name(Some("shop overview".to_string()));
    let roots = catalog.data_sources().to_vec();
    let report = EntityGraphBuilder::new(BuildOptions::default()).build(
        &mut container,
        &roots,
        &CancellationToken::new(),
    );
    assert_eq!(report.entities_added, 5);
    assert_eq!(report.edges_created, 2);

    let customers = find(catalog, "shop:public.customers");
    let log = find(catalog, "shop:audit.log");
    let customers_node = container.node_by_handle(customers).unwrap();
    let log_node = container.node_by_handle(log).unwrap();

    let logical = container
        .create_logical_edge(
            log_node,
            customers_node,
            Some("log_customer"),
            vec![AttributePair::new(
                find(catalog, "shop:audit.log.customer_id"),
                find(catalog, "shop:public.customers.id"),
            )],
            false,
        )
        .unwrap();
    container
        .edge_mut(logical)
        .unwrap()
        .set_bends(vec![BendPoint::absolute(5, 6)]);

    let orders_node = container
        .node_by_handle(find(catalog, "shop:public.orders"))
        .unwrap();
    let physical = container
        .find_edge(orders_node, customers_node, "fk_orders_customer")
        .unwrap();
    let mut bends = vec![BendPoint::absolute(100, 40), BendPoint::absolute(100, 90)];
    if relative_bend {
        bends.insert(1, BendPoint::relative(3, 3));
    }
    container.edge_mut(physical).unwrap().set_bends(bends);

    container.node_mut(customers_node).unwrap().set_primary(true);
    container
        .node_mut(orders_node)
        .unwrap()
        .set_alias(Some("o".to_string()));

    let mut x = 0;
    let handles: Vec<_> = container.nodes().map(|(_, n)| n.handle()).collect();
    for handle in handles {
        x += 150;
        container.set_entity_visual(
            handle,
            VisualInfo {
                bounds: Some(Rect::new(x, 20, 120, 80)),
                background: Some(Color::rgb(255, 255, 224)),
                foreground: Some(Color::rgb(0, 0, 0)),
                z_order: x / 150,
                attribute_visibility: None,
            },
            false,
        );
    }
    container.set_entity_visual(
        customers,
        VisualInfo {
            bounds: Some(Rect::at(10, 10)),
            attribute_visibility: Some(AttributeVisibility::Keys),
            ..VisualInfo::default()
        },
        false,
    );

    let note = container.add_note("Orders & customers <draft>", false);
    container.set_note_visual(
        note,
        VisualInfo {
            bounds: Some(Rect::new(400, 300, 200, 50)),
            background: Some(Color::rgb(250, 250, 210)),
            z_order: 9,
            ..VisualInfo::default()
        },
        false,
    );
    container
}

type EdgeKey = (String, String, String, EdgeKind, Vec<AttributePair>, Vec<BendPoint>);

fn edges(container: &DiagramContainer) -> BTreeSet<String> {
    container
        .edges()
        .map(|(_, edge)| {
            let key: EdgeKey = (
                container.node(edge.source()).unwrap().name().to_string(),
                container.node(edge.target()).unwrap().name().to_string(),
                edge.name().to_string(),
                edge.kind(),
                edge.pairs().to_vec(),
                edge.bends().to_vec(),
            );
            format!("{:?}", key)
        })
        .collect()
}

fn load(catalog: &Arc<Catalog>, xml: &str) -> (DiagramContainer, erd_diagram::LoadReport) {
    let mut container = empty(catalog);
    let report = DiagramCodec::new(catalog.as_ref())
        .load(xml, &mut container, &CancellationToken::new())
        .unwrap();
    (container, report)
}

#[test]
fn test_round_trip_restores_entities_edges_and_layout() {
    let catalog = catalog(true);
    let original = sample(&catalog, false);
    let saved = DiagramCodec::new(catalog.as_ref()).save(&original).unwrap();
    assert!(saved.diagnostics.is_empty(), "{:?}", saved.diagnostics);

    let (loaded, report) = load(&catalog, &saved.xml);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(report.entities, 5);
    assert_eq!(report.relations, 3);
    assert_eq!(report.notes, 1);
    assert!(!report.needs_layout);
    assert_eq!(loaded.name(), Some("shop overview"));

    let handles = |c: &DiagramContainer| c.nodes().map(|(_, n)| n.handle()).collect::<Vec<_>>();
    assert_eq!(handles(&loaded), handles(&original));
    assert_eq!(edges(&loaded), edges(&original));

    for (_, node) in original.nodes() {
        assert_eq!(
            loaded.entity_visual(node.handle()),
            original.entity_visual(node.handle()),
            "visual info of {}",
            node.name()
        );
        let restored = loaded
            .node(loaded.node_by_handle(node.handle()).unwrap())
            .unwrap();
        assert_eq!(restored.alias(), node.alias());
        assert_eq!(restored.is_primary(), node.is_primary());
    }

    // The attribute override restricts the restored entity to its keys
    let customers = loaded
        .node(loaded.node_by_handle(find(&catalog, "shop:public.customers")).unwrap())
        .unwrap();
    assert_eq!(customers.attributes().len(), 1);

    assert_eq!(loaded.notes().len(), 1);
    assert_eq!(loaded.notes()[0].text, "Orders & customers <draft>");
    assert_eq!(
        loaded.note_visual(loaded.notes()[0].id),
        original.note_visual(original.notes()[0].id)
    );
}

#[test]
fn test_document_layout() {
    let catalog = catalog(true);
    let original = sample(&catalog, true);
    let saved = DiagramCodec::new(catalog.as_ref())
        .save_with_time(&original, "2026-01-01T00:00:00Z")
        .unwrap();
    let doc = roxmltree::Document::parse(&saved.xml).unwrap();
    let root = doc.root_element();
    assert_eq!(root.tag_name().name(), "diagram");
    assert_eq!(root.attribute("version"), Some("1"));
    assert_eq!(root.attribute("time"), Some("2026-01-01T00:00:00Z"));

    let blocks: Vec<_> = root
        .descendants()
        .filter(|n| n.has_tag_name("data-source"))
        .map(|n| n.attribute("id").unwrap())
        .collect();
    assert_eq!(blocks, vec!["shop", "archive"]);

    let log = root
        .descendants()
        .find(|n| n.has_tag_name("entity") && n.attribute("name") == Some("log"))
        .unwrap();
    let path: Vec<_> = log
        .children()
        .filter(|n| n.has_tag_name("path"))
        .map(|n| n.attribute("name").unwrap())
        .collect();
    assert_eq!(path, vec!["audit"]);
    assert_eq!(log.attribute("fq-name"), Some("audit.log"));

    let old_orders = root
        .descendants()
        .find(|n| n.has_tag_name("entity") && n.attribute("name") == Some("old_orders"))
        .unwrap();
    assert_eq!(old_orders.children().filter(|n| n.is_element()).count(), 0);

    let logical = root
        .descendants()
        .find(|n| n.has_tag_name("relation") && n.attribute("name") == Some("log_customer"))
        .unwrap();
    assert_eq!(logical.attribute("type"), Some("logical-fk"));
    let column = logical
        .children()
        .find(|n| n.has_tag_name("column"))
        .unwrap();
    assert_eq!(column.attribute("name"), Some("customer_id"));
    assert_eq!(column.attribute("ref-name"), Some("id"));

    let physical = root
        .descendants()
        .find(|n| n.has_tag_name("relation") && n.attribute("name") == Some("fk_orders_customer"))
        .unwrap();
    assert_eq!(physical.attribute("type"), Some("fk"));
    let bend_types: Vec<_> = physical
        .children()
        .filter(|n| n.has_tag_name("bend"))
        .map(|n| n.attribute("type").unwrap())
        .collect();
    assert_eq!(bend_types, vec!["abs", "rel", "abs"]);
}

#[test]
fn test_relative_bends_are_dropped_on_load() {
    let catalog = catalog(true);
    let original = sample(&catalog, true);
    let saved = DiagramCodec::new(catalog.as_ref()).save(&original).unwrap();
    let (loaded, _) = load(&catalog, &saved.xml);

    let orders = loaded
        .node_by_handle(find(&catalog, "shop:public.orders"))
        .unwrap();
    let customers = loaded
        .node_by_handle(find(&catalog, "shop:public.customers"))
        .unwrap();
    let edge = loaded
        .find_edge(orders, customers, "fk_orders_customer")
        .unwrap();
    assert_eq!(
        loaded.edge(edge).unwrap().bends(),
        &[BendPoint::absolute(100, 40), BendPoint::absolute(100, 90)]
    );
}

#[test]
fn test_save_is_idempotent() {
    let catalog = catalog(true);
    let original = sample(&catalog, false);
    let codec = DiagramCodec::new(catalog.as_ref());
    let first = codec.save_with_time(&original, "t").unwrap();
    let (loaded, _) = load(&catalog, &first.xml);
    let second = codec.save_with_time(&loaded, "t").unwrap();
    assert_eq!(first.xml, second.xml);
}

#[test]
fn test_saving_twice_gives_identical_documents() {
    let catalog = catalog(true);
    let container = sample(&catalog, true);
    let codec = DiagramCodec::new(catalog.as_ref());
    let first = codec.save_with_time(&container, "t").unwrap();
    let second = codec.save_with_time(&container, "t").unwrap();
    assert_eq!(first.xml, second.xml);
    assert_eq!(first.diagnostics, second.diagnostics);
}

#[test]
fn test_bad_path_segment_costs_one_entity() {
    let catalog = catalog(true);
    let original = sample(&catalog, false);
    let saved = DiagramCodec::new(catalog.as_ref()).save(&original).unwrap();
    assert!(saved.xml.contains(r#"<path name="audit"/>"#));
    let broken = saved
        .xml
        .replace(r#"<path name="audit"/>"#, r#"<path name="reporting"/>"#);

    let (loaded, report) = load(&catalog, &broken);
    assert_eq!(report.diagnostics.len(), 1, "{:?}", report.diagnostics);
    assert!(report.diagnostics[0].contains("reporting"));
    assert_eq!(loaded.error_messages().len(), 1);
    assert_eq!(loaded.len(), 4);
    assert!(!loaded.contains(find(&catalog, "shop:audit.log")));
    // The logical relation to the missing entity is skipped silently
    assert_eq!(report.relations, 2);
}

#[test]
fn test_wrong_typed_path_segment() {
    let catalog = catalog(true);
    let xml = r#"<?xml version="1.0"?>
<diagram version="1">
  <entities>
    <data-source id="shop">
      <entity id="1" name="id" x="1" y="1">
        <path name="public"/>
        <path name="customers"/>
      </entity>
      <entity id="2" name="customers">
        <path name="public"/>
      </entity>
    </data-source>
  </entities>
</diagram>"#;
    let (loaded, report) = load(&catalog, xml);
    assert_eq!(report.diagnostics.len(), 1);
    assert!(report.diagnostics[0].contains("not a container"));
    assert_eq!(loaded.len(), 1);
    assert!(report.needs_layout);
    assert!(loaded.needs_layout());
}

#[test]
fn test_unreachable_data_source_is_skipped() {
    let reachable = catalog(true);
    let original = sample(&reachable, false);
    let saved = DiagramCodec::new(reachable.as_ref()).save(&original).unwrap();

    let unreachable = catalog(false);
    let (loaded, report) = load(&unreachable, &saved.xml);
    assert_eq!(report.diagnostics.len(), 1, "{:?}", report.diagnostics);
    assert!(report.diagnostics[0].contains("Archive"));
    assert_eq!(loaded.len(), 4);
}

#[test]
fn test_unknown_data_source_is_a_diagnostic() {
    let catalog = catalog(true);
    let xml = r#"<diagram version="1"><entities><data-source id="crm"><entity id="1" name="x"/></data-source></entities></diagram>"#;
    let (loaded, report) = load(&catalog, xml);
    assert_eq!(report.diagnostics, vec!["data source 'crm' not found".to_string()]);
    assert!(loaded.is_empty());
}

#[test]
fn test_version_errors_apply_nothing() {
    let catalog = catalog(true);
    let codec = DiagramCodec::new(catalog.as_ref());
    let cancel = CancellationToken::new();
    let body = r#"<entities><data-source id="shop"><entity id="1" name="customers"><path name="public"/></entity></data-source></entities>"#;

    let mut container = empty(&catalog);
    let missing = format!("<diagram>{}</diagram>", body);
    assert!(matches!(
        codec.load(&missing, &mut container, &cancel),
        Err(DiagramError::MissingVersion)
    ));
    let future = format!(r#"<diagram version="2">{}</diagram>"#, body);
    assert!(matches!(
        codec.load(&future, &mut container, &cancel),
        Err(DiagramError::UnsupportedVersion(v)) if v == "2"
    ));
    assert!(matches!(
        codec.load("<diagram version=\"1\">", &mut container, &cancel),
        Err(DiagramError::Xml(_))
    ));
    assert!(matches!(
        codec.load(r#"<model version="1"/>"#, &mut container, &cancel),
        Err(DiagramError::UnexpectedRoot(r)) if r == "model"
    ));
    assert!(container.is_empty());

    let current = format!(r#"<diagram version="1">{}</diagram>"#, body);
    codec.load(&current, &mut container, &cancel).unwrap();
    assert_eq!(container.len(), 1);
}

#[test]
fn test_cancelled_load_applies_nothing() {
    let catalog = catalog(true);
    let original = sample(&catalog, false);
    let saved = DiagramCodec::new(catalog.as_ref()).save(&original).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut container = empty(&catalog);
    let result = DiagramCodec::new(catalog.as_ref()).load(&saved.xml, &mut container, &cancel);
    assert!(matches!(result, Err(DiagramError::Cancelled)));
    assert!(container.is_empty());
    assert!(container.notes().is_empty());
}

#[test]
fn test_logical_columns_are_saved_by_name() {
    let catalog = catalog(true);
    let mut container = empty(&catalog);
    let roots = vec![find(&catalog, "shop:public")];
    EntityGraphBuilder::new(BuildOptions::default()).build(
        &mut container,
        &roots,
        &CancellationToken::new(),
    );
    let items = container
        .node_by_handle(find(&catalog, "shop:public.order_items"))
        .unwrap();
    let customers = container
        .node_by_handle(find(&catalog, "shop:public.customers"))
        .unwrap();
    let sku = find(&catalog, "shop:public.order_items.sku");
    let name = find(&catalog, "shop:public.customers.name");
    container
        .create_logical_edge(items, customers, None, vec![AttributePair::new(sku, name)], false)
        .unwrap();

    let saved = DiagramCodec::new(catalog.as_ref()).save(&container).unwrap();
    assert!(saved.diagnostics.is_empty());
    assert!(saved.xml.contains(r#"<column name="sku" ref-name="name"/>"#));
    assert_eq!(catalog.name(sku).unwrap(), "sku");
}

/// Shop and archive blocks that both number their entities from 1
const RESTARTED_IDS: &str = r#"<?xml version="1.0"?>
<diagram version="1">
  <entities>
    <data-source id="shop">
      <entity id="1" name="customers"><path name="public"/></entity>
      <entity id="2" name="orders"><path name="public"/></entity>
    </data-source>
    <data-source id="archive">
      <entity id="1" name="old_orders"/>
    </data-source>
  </entities>
  <relations>
    <relation name="fk_orders_customer" type="fk" pk-ref="1" fk-ref="2">
      <bend type="abs" x="10" y="20"/>
    </relation>
  </relations>
</diagram>"#;

#[test]
fn test_entity_ids_are_scoped_to_their_data_source() {
    let catalog = catalog(true);
    let (loaded, report) = load(&catalog, RESTARTED_IDS);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(report.entities, 3);
    assert_eq!(report.relations, 1);

    let orders = loaded
        .node_by_handle(find(&catalog, "shop:public.orders"))
        .unwrap();
    let customers = loaded
        .node_by_handle(find(&catalog, "shop:public.customers"))
        .unwrap();
    let edge = loaded
        .find_edge(orders, customers, "fk_orders_customer")
        .unwrap();
    assert_eq!(loaded.edge(edge).unwrap().bends(), &[BendPoint::absolute(10, 20)]);
}

#[test]
fn test_relation_matching_several_blocks_is_reported() {
    let catalog = catalog(true);
    let xml = RESTARTED_IDS.replace(
        r#"<entity id="1" name="old_orders"/>"#,
        r#"<entity id="1" name="old_orders"/><entity id="2" name="old_orders"/>"#,
    );
    let (_, report) = load(&catalog, &xml);
    assert_eq!(report.relations, 0);
    assert_eq!(report.diagnostics.len(), 1, "{:?}", report.diagnostics);
    assert!(report.diagnostics[0].contains("fk_orders_customer"));
}

#[test]
fn test_repeated_id_in_one_block_keeps_the_first() {
    let catalog = catalog(true);
    let xml = RESTARTED_IDS.replace(
        r#"<entity id="2" name="orders">"#,
        r#"<entity id="1" name="orders">"#,
    );
    let (loaded, report) = load(&catalog, &xml);
    assert_eq!(report.diagnostics.len(), 1, "{:?}", report.diagnostics);
    assert!(report.diagnostics[0].contains("reuses id 1"));
    assert!(loaded.contains(find(&catalog, "shop:public.orders")));
    // fk-ref 2 now names no entity
    assert_eq!(report.relations, 0);
}

/// Delegates to a catalog but cannot read the name of one object
struct UnreadableName {
    inner: Arc<Catalog>,
    broken: ObjectHandle,
}

impl MetadataProvider for UnreadableName {
    fn kind(&self, handle: ObjectHandle) -> MetaResult<ObjectKind> {
        self.inner.kind(handle)
    }

    fn name(&self, handle: ObjectHandle) -> MetaResult<String> {
        if handle == self.broken {
            return Err(MetadataError::Lookup("column dropped".to_string()));
        }
        self.inner.name(handle)
    }

    fn full_name(&self, handle: ObjectHandle) -> MetaResult<String> {
        self.inner.full_name(handle)
    }

    fn parent(&self, handle: ObjectHandle) -> MetaResult<Option<ObjectHandle>> {
        self.inner.parent(handle)
    }

    fn children(&self, container: ObjectHandle) -> MetaResult<Vec<ObjectHandle>> {
        self.inner.children(container)
    }

    fn child_by_name(&self, container: ObjectHandle, name: &str) -> MetaResult<Option<ObjectHandle>> {
        self.inner.child_by_name(container, name)
    }

    fn alias_target(&self, alias: ObjectHandle) -> MetaResult<Option<ObjectHandle>> {
        self.inner.alias_target(alias)
    }

    fn attributes(&self, entity: ObjectHandle) -> MetaResult<Vec<AttributeInfo>> {
        self.inner.attributes(entity)
    }

    fn associations(&self, entity: ObjectHandle) -> MetaResult<Vec<AssociationInfo>> {
        self.inner.associations(entity)
    }

    fn referenced_attribute(
        &self,
        constraint: ObjectHandle,
        attribute: ObjectHandle,
    ) -> MetaResult<Option<ObjectHandle>> {
        self.inner.referenced_attribute(constraint, attribute)
    }
}

#[test]
fn test_unreadable_column_is_omitted_from_relation() {
    let catalog = catalog(true);
    let name = find(&catalog, "shop:public.customers.name");
    let provider = UnreadableName {
        inner: catalog.clone(),
        broken: name,
    };
    let mut container = DiagramContainer::new(Arc::new(provider), Arc::new(DefaultDecorator::default()));
    EntityGraphBuilder::new(BuildOptions::default()).build(
        &mut container,
        &[find(&catalog, "shop:public")],
        &CancellationToken::new(),
    );
    let items = container
        .node_by_handle(find(&catalog, "shop:public.order_items"))
        .unwrap();
    let customers = container
        .node_by_handle(find(&catalog, "shop:public.customers"))
        .unwrap();
    container
        .create_logical_edge(
            items,
            customers,
            Some("items_customer"),
            vec![
                AttributePair::new(
                    find(&catalog, "shop:public.order_items.order_id"),
                    find(&catalog, "shop:public.customers.id"),
                ),
                AttributePair::new(find(&catalog, "shop:public.order_items.sku"), name),
            ],
            false,
        )
        .unwrap();
    assert_eq!(container.edges().count(), 3);

    let saved = DiagramCodec::new(catalog.as_ref()).save(&container).unwrap();
    assert_eq!(saved.diagnostics.len(), 1, "{:?}", saved.diagnostics);
    assert!(saved.diagnostics[0].contains("items_customer"));

    let doc = roxmltree::Document::parse(&saved.xml).unwrap();
    let relation = doc
        .descendants()
        .find(|n| n.has_tag_name("relation") && n.attribute("name") == Some("items_customer"))
        .unwrap();
    let columns: Vec<_> = relation
        .children()
        .filter(|n| n.has_tag_name("column"))
        .map(|n| (n.attribute("name").unwrap(), n.attribute("ref-name")))
        .collect();
    assert_eq!(columns, vec![("order_id", Some("id"))]);
}

/// (entity, visible attribute count) and (relation, pair count) of a container
fn visible_shape(container: &DiagramContainer) -> (Vec<(String, usize)>, BTreeSet<(String, usize)>) {
    let nodes = container
        .nodes()
        .map(|(_, n)| (n.name().to_string(), n.attributes().len()))
        .collect();
    let edges = container
        .edges()
        .map(|(_, e)| (e.name().to_string(), e.pairs().len()))
        .collect();
    (nodes, edges)
}

#[test]
fn test_attribute_visibility_survives_reload() {
    let catalog = catalog(true);
    let cancel = CancellationToken::new();
    let mut built = DiagramContainer::new(
        catalog.clone(),
        Arc::new(DefaultDecorator::new(AttributeVisibility::Primary)),
    );
    EntityGraphBuilder::new(BuildOptions::default()).build(
        &mut built,
        &[find(&catalog, "shop:public")],
        &cancel,
    );
    let hidden = BuildOptions {
        visibility: Some(AttributeVisibility::None),
        ..BuildOptions::default()
    };
    EntityGraphBuilder::new(hidden).build(&mut built, &[find(&catalog, "shop:audit")], &cancel);
    let log = find(&catalog, "shop:audit.log");
    assert!(built
        .node(built.node_by_handle(log).unwrap())
        .unwrap()
        .attributes()
        .is_empty());

    let codec = DiagramCodec::new(catalog.as_ref());
    let saved = codec.save_with_time(&built, "t").unwrap();
    let doc = roxmltree::Document::parse(&saved.xml).unwrap();
    assert_eq!(doc.root_element().attribute("attributes"), Some("primary"));

    // Loaded with the default decorator, as `inspect` does
    let (loaded, report) = load(&catalog, &saved.xml);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(loaded.attribute_visibility(), Some(AttributeVisibility::Primary));
    assert_eq!(visible_shape(&loaded), visible_shape(&built));
    assert_eq!(codec.save_with_time(&loaded, "t").unwrap().xml, saved.xml);
}
