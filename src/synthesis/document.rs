//! Fragment document assembly.
//!
//! Resolved fields are placed into a tree of NeXus groups and written out
//! with quick-xml. Linked fields get one `data:NXdata` group per outermost
//! group, holding one link per field in order of first occurrence. That group
//! sits right after the first-level child containing the first linked field,
//! or at the end when the field lives directly in the outermost group.

use super::layers::{FieldSource, ResolvedField};
use super::nexus_path::PathSegment;
use daq_selector_core::xml::{copy_definition_children, document_writer, finish, DEFINITION_TAG};
use daq_selector_core::Result;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::io::Write;

const LINK_GROUP: &str = "data";
const LINK_GROUP_TYPE: &str = "NXdata";

#[derive(Debug)]
enum Node<'a> {
    Group(Group<'a>),
    Field(&'a ResolvedField),
    Link { name: String, target: String },
}

#[derive(Debug)]
struct Group<'a> {
    name: String,
    nx_type: String,
    children: Vec<Node<'a>>,
}

impl<'a> Group<'a> {
    fn new(segment: &PathSegment) -> Self {
        Self {
            name: segment.name.clone(),
            nx_type: segment.nx_type.clone(),
            children: Vec::new(),
        }
    }

    fn matches(&self, segment: &PathSegment) -> bool {
        self.name == segment.name && self.nx_type == segment.nx_type
    }

    /// Index of the child group for `segment`, created if missing.
    fn child_index(&mut self, segment: &PathSegment) -> usize {
        match self
            .children
            .iter()
            .position(|node| matches!(node, Node::Group(g) if g.matches(segment)))
        {
            Some(index) => index,
            None => {
                self.children.push(Node::Group(Group::new(segment)));
                self.children.len() - 1
            }
        }
    }

    fn child_group(&mut self, index: usize) -> Option<&mut Group<'a>> {
        match self.children.get_mut(index) {
            Some(Node::Group(group)) => Some(group),
            _ => None,
        }
    }

    /// Append `field` under the remaining `path`; returns the first-level child index used.
    fn insert(&mut self, path: &[PathSegment], field: &'a ResolvedField) -> Option<usize> {
        let Some((first, rest)) = path.split_first() else {
            self.children.push(Node::Field(field));
            return None;
        };
        let index = self.child_index(first);
        if let Some(child) = self.child_group(index) {
            child.insert(rest, field);
        }
        Some(index)
    }
}

/// Links collected for one outermost group.
#[derive(Debug, Default)]
struct LinkPlan {
    /// First-level child holding the first linked field, if nested.
    anchor: Option<usize>,
    links: Vec<(String, String)>,
}

/// Render `fields` as a `<definition>` document.
pub(crate) fn render(fields: &[ResolvedField]) -> Result<String> {
    let mut roots: Vec<Group<'_>> = Vec::new();
    let mut plans: Vec<LinkPlan> = Vec::new();

    for field in fields {
        let Some((outer, inner)) = field.path.split_first() else {
            continue;
        };
        let root = match roots.iter().position(|g| g.matches(outer)) {
            Some(index) => index,
            None => {
                roots.push(Group::new(outer));
                plans.push(LinkPlan::default());
                roots.len() - 1
            }
        };
        let first_level = roots[root].insert(inner, field);
        if field.link {
            let plan = &mut plans[root];
            if plan.links.is_empty() {
                plan.anchor = first_level;
            }
            let link = (field.field_name.clone(), link_target(field));
            if !plan.links.contains(&link) {
                plan.links.push(link);
            }
        }
    }

    for (group, plan) in roots.iter_mut().zip(plans) {
        attach_links(group, plan);
    }

    let mut writer = document_writer()?;
    if roots.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(DEFINITION_TAG)))?;
        return finish(writer);
    }
    writer.write_event(Event::Start(BytesStart::new(DEFINITION_TAG)))?;
    for group in &roots {
        write_group(&mut writer, group)?;
    }
    writer.write_event(Event::End(BytesEnd::new(DEFINITION_TAG)))?;
    finish(writer)
}

fn link_target(field: &ResolvedField) -> String {
    let groups: Vec<String> = field.path.iter().map(PathSegment::qualified).collect();
    format!("/{}/{}", groups.join("/"), field.field_name)
}

fn attach_links(group: &mut Group<'_>, plan: LinkPlan) {
    if plan.links.is_empty() {
        return;
    }
    let links = plan.links.into_iter().map(|(name, target)| Node::Link { name, target });
    let data = PathSegment {
        name: LINK_GROUP.to_string(),
        nx_type: LINK_GROUP_TYPE.to_string(),
    };
    if let Some(Node::Group(existing)) = group
        .children
        .iter_mut()
        .find(|node| matches!(node, Node::Group(g) if g.matches(&data)))
    {
        existing.children.extend(links);
        return;
    }
    let mut data_group = Group::new(&data);
    data_group.children.extend(links);
    let position = plan
        .anchor
        .map_or(group.children.len(), |anchor| anchor + 1)
        .min(group.children.len());
    group.children.insert(position, Node::Group(data_group));
}

fn write_group<W: Write>(writer: &mut Writer<W>, group: &Group<'_>) -> Result<()> {
    let mut start = BytesStart::new("group");
    start.push_attribute(("name", group.name.as_str()));
    start.push_attribute(("type", group.nx_type.as_str()));
    writer.write_event(Event::Start(start))?;
    for child in &group.children {
        match child {
            Node::Group(inner) => write_group(writer, inner)?,
            Node::Field(field) => write_field(writer, field)?,
            Node::Link { name, target } => {
                let mut link = BytesStart::new("link");
                link.push_attribute(("name", name.as_str()));
                link.push_attribute(("target", target.as_str()));
                writer.write_event(Event::Empty(link))?;
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new("group")))?;
    Ok(())
}

fn write_field<W: Write>(writer: &mut Writer<W>, field: &ResolvedField) -> Result<()> {
    let mut start = BytesStart::new("field");
    start.push_attribute(("name", field.field_name.as_str()));
    start.push_attribute(("type", field.nexus_type));
    writer.write_event(Event::Start(start))?;

    let mut strategy = BytesStart::new("strategy");
    strategy.push_attribute(("mode", field.strategy.as_str()));
    writer.write_event(Event::Empty(strategy))?;

    match &field.source {
        FieldSource::Declared(body) => copy_definition_children(body, writer)?,
        FieldSource::Synthesized(definition) => definition.write_xml(writer)?,
    }

    if !field.shape.is_empty() {
        let mut dimensions = BytesStart::new("dimensions");
        dimensions.push_attribute(("rank", field.shape.len().to_string().as_str()));
        writer.write_event(Event::Start(dimensions))?;
        for (index, value) in field.shape.iter().enumerate() {
            let mut dim = BytesStart::new("dim");
            dim.push_attribute(("index", (index + 1).to_string().as_str()));
            dim.push_attribute(("value", value.to_string().as_str()));
            writer.write_event(Event::Empty(dim))?;
        }
        writer.write_event(Event::End(BytesEnd::new("dimensions")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("field")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::nexus_path::parse_path;
    use daq_selector_core::{DataSourceDefinition, Strategy, DEFAULT_DYNAMIC_PATH};

    fn field(name: &str, path: &str, link: bool) -> ResolvedField {
        ResolvedField {
            channel: name.into(),
            field_name: name.into(),
            strategy: Strategy::Step,
            nexus_type: "NX_CHAR",
            shape: Vec::new(),
            path: parse_path(path),
            link,
            source: FieldSource::Synthesized(DataSourceDefinition::client(name, name)),
        }
    }

    #[test]
    fn empty_input_renders_empty_definition() {
        let text = render(&[]).unwrap();
        assert!(text.contains("<definition/>"));
    }

    #[test]
    fn shared_groups_are_merged() {
        let fields = [
            field("a", DEFAULT_DYNAMIC_PATH, false),
            field("b", DEFAULT_DYNAMIC_PATH, false),
        ];
        let text = render(&fields).unwrap();
        assert_eq!(text.matches("type=\"NXinstrument\"").count(), 1);
        assert_eq!(text.matches("<field ").count(), 2);
    }

    #[test]
    fn one_data_group_per_outer_group() {
        let fields = [
            field("a", DEFAULT_DYNAMIC_PATH, true),
            field("b", "/entry:NXentry/sample:NXsample", true),
            field("c", DEFAULT_DYNAMIC_PATH, true),
        ];
        let text = render(&fields).unwrap();
        assert_eq!(text.matches("type=\"NXdata\"").count(), 2);
        let first = text.find("<link name=\"a\"").unwrap();
        let second = text.find("<link name=\"c\"").unwrap();
        assert!(first < second);
        assert!(text.contains("/instrument:NXinstrument/collection:NXcollection/a\""));
    }

    #[test]
    fn same_name_in_sibling_groups_keeps_both_links() {
        let fields = [
            field("a", "/entry:NXentry/instrument:NXinstrument", true),
            field("a", "/entry:NXentry/sample:NXsample", true),
            field("a", "/entry:NXentry/sample:NXsample", true),
        ];
        let text = render(&fields).unwrap();
        assert_eq!(text.matches("<link name=\"a\"").count(), 2);
        assert!(text.contains("target=\"/entry:NXentry/instrument:NXinstrument/a\""));
        assert!(text.contains("target=\"/entry:NXentry/sample:NXsample/a\""));
    }

    #[test]
    fn data_group_follows_anchor_child() {
        let fields = [
            field("a", "/entry:NXentry/instrument:NXinstrument", true),
            field("b", "/entry:NXentry/sample:NXsample", false),
        ];
        let text = render(&fields).unwrap();
        let instrument = text.find("name=\"instrument\"").unwrap();
        let data = text.find("name=\"data\"").unwrap();
        let sample = text.find("name=\"sample\"").unwrap();
        assert!(instrument < data && data < sample);
    }

    #[test]
    fn dimensions_only_for_shaped_fields() {
        let mut image = field("img", DEFAULT_DYNAMIC_PATH, false);
        image.shape = vec![512, 256];
        let text = render(&[image, field("s", DEFAULT_DYNAMIC_PATH, false)]).unwrap();
        assert_eq!(text.matches("<dimensions rank=\"2\">").count(), 1);
        assert!(text.contains("<dim index=\"1\" value=\"512\"/>"));
        assert!(text.contains("<dim index=\"2\" value=\"256\"/>"));
    }
}
